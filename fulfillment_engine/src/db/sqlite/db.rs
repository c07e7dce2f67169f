//! `SqliteDatabase` is a concrete implementation of a fulfillment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend. The database itself only opens sessions; the storage traits are
//! implemented by [`SqliteSession`].
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{new_pool, SqliteDatabaseError, SqliteSession};
use crate::{config::EngineConfig, db::traits::FulfillmentDatabase};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database named in the configuration, typically loaded with
    /// [`EngineConfig::from_env_or_default`].
    pub async fn from_config(config: &EngineConfig) -> Result<Self, SqliteDatabaseError> {
        info!("🗃️ Using database URL: {}", config.database_url);
        SqliteDatabase::new_with_url(config.database_url.as_str(), config.max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Connection pool for {url} created");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Returns a reference to the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;
    type Session = SqliteSession;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn begin(&self) -> Result<Self::Session, Self::Error> {
        SqliteSession::begin(&self.pool).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        info!("🗃️ Database connection pool closed");
        Ok(())
    }
}
