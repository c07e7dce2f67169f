//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the fulfillment engine database *backends*.
//!
//! ## Sessions
//! All engine work happens inside a session: one unit of work that is either committed or rolled back as a whole.
//! A backend hands out sessions via [`FulfillmentDatabase::begin`], and the session type implements every storage
//! trait below. Nothing in the engine holds a global connection; the handle is always passed in.
//!
//! ## Traits
//! * [`FulfillmentDatabase`] is the entry point for a backend. It opens sessions.
//! * [`DatabaseSession`] commits or rolls back a session.
//! * [`InventoryManagement`] reads and atomically adjusts per-store stock counters, with an audit journal.
//! * [`StoreDirectory`] lists stores, their locations and which products they stock.
//! * [`MutationManagement`] persists inter-store transfer requests and their status history.
//! * [`OrderManagement`] reads orders and records order status and payment changes.
mod data_objects;
mod fulfillment_database;
mod inventory_management;
mod mutation_management;
mod order_management;
mod store_directory;

pub use data_objects::InsertMutationResult;
pub use fulfillment_database::{DatabaseSession, FulfillmentDatabase};
pub use inventory_management::InventoryManagement;
pub use mutation_management::MutationManagement;
pub use order_management::OrderManagement;
pub use store_directory::StoreDirectory;
