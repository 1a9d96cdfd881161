use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils::assets::asset_dir;

pub mod entities;
pub mod events;
pub mod models;
pub mod types;

pub use sea_orm::{ConnectionTrait, DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

fn database_url() -> String {
    match std::env::var(DATABASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => format!(
            "sqlite://{}?mode=rwc",
            asset_dir().join("db.sqlite").to_string_lossy()
        ),
    }
}

impl DBService {
    pub async fn new() -> Result<DBService, DbErr> {
        let url = database_url();
        let mut options = ConnectOptions::new(url);
        options
            .connect_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        let seeded = models::sla::SlaTarget::ensure_defaults(&pool).await?;
        tracing::debug!(seeded_sla_targets = seeded, "Database migrations applied");
        Ok(DBService { pool })
    }

    /// Wraps an existing connection without running migrations.
    pub fn from_connection(pool: DbPool) -> DBService {
        DBService { pool }
    }
}

#[cfg(test)]
pub(crate) mod test_db {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    pub async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }
}
