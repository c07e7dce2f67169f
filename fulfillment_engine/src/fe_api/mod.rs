//! # Fulfillment engine public API
//!
//! The `fe_api` module exposes the programmatic API of the fulfillment engine. Like the storage layer, it is modular,
//! so that callers can pick the parts they need.
//!
//! * [`inventory_ledger`] reads and atomically adjusts per-store stock, with an audit journal.
//! * [`store_locator`] ranks stores holding a product by distance from a point.
//! * [`mutation_workflow`] creates inter-store transfer requests and drives them through their status workflow.
//! * [`allocator`] sources every line item of an order from the nearest store and, where needed, alternate stores.
//! * [`order_flow_api`] drives orders through payment review, allocation, shipping and delivery.
//!
//! Each module offers free functions that work on an open session, which is how the allocator composes ledger,
//! locator and workflow steps into one unit of work, and an API struct that runs every call in its own session.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend. The backend handle is cheap to clone.
//!
//! ```rust,ignore
//! use fulfillment_engine::{events::{EventHandlers, EventHooks}, EngineConfig, FulfillmentAllocator, SqliteDatabase};
//! let config = EngineConfig::from_env_or_default();
//! let db = SqliteDatabase::from_config(&config).await?;
//! let handlers = EventHandlers::from_config(&config, EventHooks::default());
//! let allocator = FulfillmentAllocator::from_config(db, handlers.producers(), &config);
//! handlers.start_handlers().await;
//! let report = allocator.allocate_stock_for_order(&items, delivery, nearest_store, order_id, customer_id).await?;
//! ```
pub mod allocation_objects;
pub mod allocator;
pub mod errors;
pub mod inventory_ledger;
pub mod mutation_workflow;
pub mod order_flow_api;
pub mod store_locator;
