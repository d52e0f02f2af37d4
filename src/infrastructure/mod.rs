//! 基础设施层

#[cfg(feature = "postgres")]
pub mod database;
pub mod logger;
