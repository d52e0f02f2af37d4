//! 请求解码
//!
//! axum 和 hyper 两个传输层都走这里，同一个请求得到同一个 [`UserForm`]。

use http::{header, Request};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;

use super::model::UserForm;
use crate::core::error::UserError;

/// 请求体上限，超过返回 413
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// 读取请求体和查询串并合并，请求体中的字段优先
pub async fn read_user_form<B>(req: Request<B>) -> Result<UserForm, UserError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let query = UserForm::from_query(parts.uri.query())?;
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let body = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                UserError::PayloadTooLarge(MAX_BODY_BYTES)
            } else {
                UserError::Validation(format!("failed to read request body: {e}"))
            }
        })?
        .to_bytes();

    Ok(UserForm::decode(content_type, &body)?.or_query(query))
}
