//! Database Module
//!
//! Connection pooling over the runtime-selected store (SQLite file or
//! PostgreSQL server), idempotent schema creation, and the data source
//! registry.

pub mod registry;
pub mod schema;

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

pub use registry::{DataSourceRegistry, SourceDescription};
pub use schema::ensure_schema;

/// Store dialect, inferred from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// File-backed store
    Sqlite,
    /// Server-backed store
    Postgres,
}

impl Dialect {
    /// Infer the dialect from a connection URL.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres") {
            Self::Postgres
        } else {
            Self::Sqlite
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Create a connection pool for the given URL.
///
/// `sqlx::any::install_default_drivers()` must have run once at process
/// start before any pool is created.
pub async fn create_pool(url: &str, max_connections: u32) -> Result<AnyPool, sqlx::Error> {
    AnyPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
}
