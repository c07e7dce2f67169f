//! SQLite backend for the fulfillment engine.
//!
//! Every session is a `BEGIN IMMEDIATE` transaction on a pooled connection, so writers serialize at the start of a
//! unit of work rather than failing half-way through when they try to upgrade a read lock.
mod db;
mod errors;
mod session;

pub mod inventory;
pub mod mutations;
pub mod orders;
pub mod stores;

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::info;
pub use session::SqliteSession;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Applies the embedded schema migrations to the database behind `pool`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteDatabaseError> {
    sqlx::migrate!("./src/db/sqlite/migrations").run(pool).await?;
    info!("🗃️ Migrations complete");
    Ok(())
}

pub(crate) fn bad_data<E: std::fmt::Display>(e: E) -> SqliteDatabaseError {
    SqliteDatabaseError::QueryError(format!("Invalid data in database: {e}"))
}
