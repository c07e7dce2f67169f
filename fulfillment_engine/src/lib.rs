//! Storefront fulfillment engine
//!
//! This library holds the order fulfillment core of the storefront: when a customer order is accepted, it decides
//! which store supplies each line item, deducts the stock and, when the nearest store runs short, draws from
//! alternate stores and records an inter-store transfer ("mutation") request for each of them. It keeps inventory
//! counts, mutation records and order state consistent under concurrent orders competing for the same stock.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite and an in-memory store are the supported backends. Every
//!    operation runs inside a session, a unit of work that is committed or rolled back as a whole. The data types used
//!    by the backends are defined in the [`db_types`] module and are public.
//! 2. The engine public API ([`mod@fe_api`]): the inventory ledger, store locator, mutation workflow, fulfillment
//!    allocator and the order flow that drives them.
//!
//! The engine also publishes [`events`] after a unit of work commits, e.g. when a mutation is requested or an order
//! has been allocated. Hooks can subscribe to these events and react to them.
pub mod config;
pub mod db;
pub mod db_types;
pub mod events;
pub mod fe_api;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use config::EngineConfig;
pub use db::memory::{MemoryDatabase, MemoryDatabaseError};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    DatabaseSession,
    FulfillmentDatabase,
    InsertMutationResult,
    InventoryManagement,
    MutationManagement,
    OrderManagement,
    StoreDirectory,
};
pub use fe_api::{
    allocation_objects::{AllocationReport, Deduction, LineAllocation},
    allocator::FulfillmentAllocator,
    errors::{FulfillmentError, OrderFlowError},
    inventory_ledger::InventoryLedger,
    mutation_workflow::MutationWorkflow,
    order_flow_api::OrderFlowApi,
    store_locator::{StoreCandidate, StoreLocator},
};
