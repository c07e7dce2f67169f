use thiserror::Error;

use crate::db_types::{OrderId, StoreId};

#[derive(Debug, Clone, Error)]
pub enum MemoryDatabaseError {
    #[error("Store {0} does not exist")]
    UnknownStore(StoreId),
    #[error("Order {0} does not exist")]
    UnknownOrder(OrderId),
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
    #[error("The database session has already been committed or rolled back")]
    SessionClosed,
}
