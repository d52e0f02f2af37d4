//! # 用户 CRUD 资源服务
//!
//! 同一个用户资源核心（创建、列表、查询、更新、删除）挂在两种路由之上：
//! - axum 路由（tower 中间件栈）
//! - 裸 hyper + matchit 路由
//!
//! 存储可以是 PostgreSQL（sqlx）或进程内存，二者的唯一性语义一致。

pub mod app;
pub mod config;
pub mod core;
pub mod infrastructure;

pub use crate::app::users::memory_store::MemoryUserStore;
pub use crate::app::users::model::{User, UserForm, UserId};
pub use crate::app::users::service::UserResource;
pub use crate::app::users::store::{StoreError, UserStore};
pub use crate::config::Config;
pub use crate::core::error::{ErrorResponse, UserError};
