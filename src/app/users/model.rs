//! 用户数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::core::error::UserError;

/// 用户主键，由存储层分配，永不复用
pub type UserId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待插入的用户，id 和时间戳由存储层生成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: u32,
}

/// 更新请求中实际提供的字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(age) = self.age {
            user.age = age;
        }
    }
}

/// 传输层解码出来的原始表单
///
/// 所有字段都是字符串；空字符串和缺省等价。JSON 请求里的 `age`
/// 可以是数字也可以是字符串。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub age: Option<String>,
}

impl UserForm {
    pub fn new(name: &str, email: &str, age: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            age: Some(age.to_string()),
        }
    }

    /// 创建用户：三个字段都必须非空，age 必须是 u32
    pub fn into_new_user(self) -> Result<NewUser, UserError> {
        let input = CreateUserInput {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            age: self.age.unwrap_or_default(),
        };
        input.validate()?;

        Ok(NewUser {
            age: parse_age(&input.age)?,
            name: input.name,
            email: input.email,
        })
    }

    /// 按 Content-Type 解码请求体
    ///
    /// 只认 `application/x-www-form-urlencoded` 和 `application/json`；
    /// 缺少或其他类型的请求体被忽略，字段只能来自查询串。
    pub fn decode(content_type: Option<&str>, body: &[u8]) -> Result<Self, UserError> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("application/json") => serde_json::from_slice(body)
                .map_err(|e| UserError::Validation(format!("invalid JSON body: {e}"))),
            Some("application/x-www-form-urlencoded") => serde_urlencoded::from_bytes(body)
                .map_err(|e| UserError::Validation(format!("invalid form body: {e}"))),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_query(query: Option<&str>) -> Result<Self, UserError> {
        serde_urlencoded::from_str(query.unwrap_or_default())
            .map_err(|e| UserError::Validation(format!("invalid query string: {e}")))
    }

    /// 请求体里出现过的字段优先，其余取查询串
    pub fn or_query(self, query: Self) -> Self {
        Self {
            name: self.name.or(query.name),
            email: self.email.or(query.email),
            age: self.age.or(query.age),
        }
    }

    /// 更新用户：空字段表示不修改，提供的 age 必须可解析
    pub fn into_patch(self) -> Result<UserPatch, UserError> {
        let age = match supplied(self.age) {
            Some(raw) => Some(parse_age(&raw)?),
            None => None,
        };

        Ok(UserPatch {
            name: supplied(self.name),
            email: supplied(self.email),
            age,
        })
    }
}

#[derive(Debug, Validate)]
struct CreateUserInput {
    #[validate(length(min = 1, message = "name must not be empty"))]
    name: String,

    #[validate(length(min = 1, message = "email must not be empty"))]
    email: String,

    #[validate(length(min = 1, message = "age must not be empty"))]
    age: String,
}

fn supplied(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

// `str::parse` 接受前导 `+`，这里只认十进制数字
fn parse_decimal(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub fn parse_age(raw: &str) -> Result<u32, UserError> {
    parse_decimal(raw)
        .ok_or_else(|| UserError::Validation(format!("age must be a non-negative 32-bit integer, got {raw:?}")))
}

pub fn parse_user_id(raw: &str) -> Result<UserId, UserError> {
    parse_decimal(raw)
        .and_then(|id| UserId::try_from(id).ok())
        .ok_or_else(|| UserError::Validation(format!("invalid user id {raw:?}")))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}
