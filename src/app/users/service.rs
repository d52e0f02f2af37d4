//! 用户资源核心
//!
//! 与传输层无关：各路由只负责解码请求、编码响应，其余都在这里。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::model::{parse_user_id, User, UserForm};
use super::store::{StoreError, UserStore};
use crate::core::error::UserError;

#[derive(Clone)]
pub struct UserResource {
    store: Arc<dyn UserStore>,
    store_timeout: Option<Duration>,
}

impl UserResource {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            store_timeout: None,
        }
    }

    /// 单次存储调用的截止时间，超时后丢弃该 future 即取消请求
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    async fn call<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, UserError> {
        let result = match self.store_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| UserError::Timeout)?,
            None => op.await,
        };
        result.map_err(UserError::from)
    }

    pub async fn create(&self, form: UserForm) -> Result<User, UserError> {
        let new_user = form.into_new_user()?;
        let email = new_user.email.clone();

        let user = self.call(self.store.insert(new_user)).await.inspect_err(|err| {
            if matches!(err, UserError::Conflict(_)) {
                warn!(%email, "create rejected: email already exists");
            }
        })?;

        info!(user_id = user.id, email = %user.email, "user created");
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        self.call(self.store.select_all()).await
    }

    pub async fn get(&self, raw_id: &str) -> Result<User, UserError> {
        let id = parse_user_id(raw_id)?;
        self.call(self.store.select_by_id(id)).await
    }

    /// 所有字段先校验再读写，校验失败不会产生任何写入
    pub async fn update(&self, raw_id: &str, form: UserForm) -> Result<User, UserError> {
        let id = parse_user_id(raw_id)?;
        let patch = form.into_patch()?;

        let user = self.call(self.store.update_fields(id, patch)).await.inspect_err(|err| {
            if matches!(err, UserError::Conflict(_)) {
                warn!(user_id = id, "update rejected: email already exists");
            }
        })?;

        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), UserError> {
        let id = parse_user_id(raw_id)?;
        self.call(self.store.delete_by_id(id)).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }
}
