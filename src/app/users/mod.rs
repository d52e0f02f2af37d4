//! 用户资源：模型、存储、核心服务和两套传输层

pub mod handler;
pub mod hyper_handler;
pub mod input;
pub mod memory_store;
pub mod model;
#[cfg(feature = "postgres")]
pub mod pg_store;
pub mod service;
pub mod store;
