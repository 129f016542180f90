//! # docket-db
//!
//! PostgreSQL storage layer for docket.
//!
//! This crate provides:
//! - Connection pool management
//! - Content-addressed file storage deduplicated by SHA-256
//! - The per-user upload catalog
//! - The parse-job queue with leased claims
//! - An in-memory backend with the same guarantees, for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use docket_db::{ContentStore, Database, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect_with_config("postgres://localhost/docket", PoolConfig::from_env()).await?;
//!     db.migrate().await?;
//!
//!     let resolution = db.files.resolve(b"%PDF-1.7 ...", "report.pdf").await?;
//!     println!("Stored {} (new: {})", resolution.stored_file_id, resolution.is_new);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod content_store;
pub mod memory;
pub mod pool;
pub mod queue;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use docket_core::*;

// Re-export repository implementations
pub use catalog::PgUploadCatalog;
pub use content_store::{compute_content_hash, PgContentStore};
pub use memory::MemoryStore;
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use queue::PgWorkQueue;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Content-addressed file store.
    pub files: PgContentStore,
    /// Per-user upload catalog.
    pub uploads: PgUploadCatalog,
    /// Parse-job queue.
    pub jobs: PgWorkQueue,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            files: PgContentStore::new(pool.clone()),
            uploads: PgUploadCatalog::new(pool.clone()),
            jobs: PgWorkQueue::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the given pool settings.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Close all pool connections, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
