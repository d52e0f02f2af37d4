//! 核心层：错误映射和中间件

pub mod error;
pub mod middleware;
