//! Local content store: SQLite pool, migrations and content rows.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use crate::errors::Result;
use crate::metadata::store::{local_content_address, ContentStore};
use crate::types::ContentHash;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Every connection to `:memory:` is its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Content store migrations applied successfully");
    Ok(pool)
}

/// Content store keyed by Keccak-256 of the stored bytes.
#[derive(Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self {
            pool: init_pool(database_url).await?,
        })
    }

    pub async fn count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    /// Storing the same bytes twice is a no-op returning the same address.
    async fn store(&self, bytes: Vec<u8>, name: &str) -> Result<ContentHash> {
        let address = local_content_address(&bytes);
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO content (address, name, body)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(address.as_str())
        .bind(name)
        .bind(&bytes)
        .execute(&self.pool)
        .await?
        .rows_affected();
        debug!(%address, inserted, "Stored {name}");
        Ok(address)
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT body FROM content WHERE address = ?1")
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(body,)| body))
    }
}
