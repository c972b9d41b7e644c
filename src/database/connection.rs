use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

/// 服务之间共享同一个连接；测试里每个服务各自包一个 MockDatabase
pub type DbPool = Arc<DatabaseConnection>;

/// Opens the connection pool once at startup; services receive clones of the handle.
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let pool = Database::connect(opts).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool.as_ref(), None).await?;
    Ok(())
}
