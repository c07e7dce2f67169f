use crate::db::traits::{InventoryManagement, MutationManagement, OrderManagement, StoreDirectory};

/// A single unit of work against a backend.
///
/// Dropping a session without committing it must discard its changes.
#[allow(async_fn_in_trait)]
pub trait DatabaseSession: Sized {
    type Error: std::error::Error;

    async fn commit(self) -> Result<(), Self::Error>;

    async fn rollback(self) -> Result<(), Self::Error>;
}

/// This trait defines the highest level of behaviour for backends supporting the fulfillment engine.
///
/// Backends are cheap to clone handles (e.g. a connection pool). Every operation the engine performs runs inside a
/// session obtained from [`FulfillmentDatabase::begin`].
///
/// Backends must guarantee that sessions which modify the same inventory record are serialized: two concurrent
/// deductions can never both pass a stock check and then both apply.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone {
    type Error: std::error::Error;
    type Session: DatabaseSession<Error = Self::Error>
        + InventoryManagement<Error = Self::Error>
        + StoreDirectory<Error = Self::Error>
        + MutationManagement<Error = Self::Error>
        + OrderManagement<Error = Self::Error>;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Starts a new unit of work.
    async fn begin(&self) -> Result<Self::Session, Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
