//! 用户存储抽象
//!
//! 资源核心只依赖这个 trait；唯一性和主键分配都由实现方保证。

use async_trait::async_trait;
use thiserror::Error;

use super::model::{NewUser, User, UserId, UserPatch};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("no user with id {0}")]
    NotFound(UserId),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// email 唯一约束名，内存实现和 PostgreSQL 默认约束名保持一致
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// 按 created_at 倒序返回全部用户
    async fn select_all(&self) -> Result<Vec<User>, StoreError>;

    async fn select_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// 持久化 name/email/age 并刷新 updated_at
    async fn update(&self, user: User) -> Result<User, StoreError>;

    /// 只写入补丁里提供的字段并刷新 updated_at
    ///
    /// 默认实现先读后写，两次调用之间的并发修改会被覆盖；
    /// 自带存储都用一次加锁或一条语句完成。
    async fn update_fields(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        let mut user = self.select_by_id(id).await?;
        patch.apply_to(&mut user);
        self.update(user).await
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), StoreError>;
}
