//! 数据库迁移工具
//!
//! 建立 users 表后退出，服务启动时也会执行同样的迁移。

use anyhow::Context;
use tracing::info;

use frameworks_crud::config::Config;
use frameworks_crud::infrastructure::{database::DatabaseManager, logger::Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = Logger::init(&config.logging)?;

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("migration failed")?;

    info!("migrations applied successfully");
    Ok(())
}
