//! # conspectium-db
//!
//! PostgreSQL persistence for Conspectium.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgGenerationRepository`], the transactional implementation of
//!   [`GenerationRepository`]
//! - Blob storage for uploaded audio ([`StorageBackend`])
//! - In-memory repository and storage for tests and database-less runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use conspectium_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/conspectium").await?;
//!     let job = db.generation.get_job(job_id).await?;
//!     println!("{:?}", job.map(|j| j.status));
//!     Ok(())
//! }
//! ```
pub mod audio_sources;
pub mod file_storage;
pub mod jobs;
pub mod memory;
pub mod notes;
pub mod pool;
pub mod quizzes;

// Re-export core types
pub use conspectium_core::*;

pub use file_storage::{
    compute_content_hash, generate_storage_path, FilesystemBackend, StorageBackend,
};
pub use jobs::PgGenerationRepository;
pub use memory::{MemoryGenerationRepository, MemoryStorage};
pub use pool::{create_pool_with_config, log_pool_metrics, PoolConfig};

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Generation pipeline repository.
    pub generation: PgGenerationRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            generation: PgGenerationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the given URL, sizing the pool from
    /// `DATABASE_MAX_CONNECTIONS` and `DATABASE_CONNECT_TIMEOUT_SECS`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::from_env()).await
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        log_pool_metrics(&pool);
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

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
