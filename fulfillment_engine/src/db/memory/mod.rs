//! A process-local fulfillment backend.
//!
//! `MemoryDatabase` keeps all state behind a single async mutex. A session holds the lock for its whole lifetime, so
//! sessions are fully serialized, and keeps a snapshot of the state taken when it began. Rolling back (or dropping
//! the session without committing) restores that snapshot.
//!
//! It is meant for unit tests and for callers that want to exercise the engine without a database file.
mod errors;
mod session;

use std::{collections::BTreeMap, sync::Arc};

pub use errors::MemoryDatabaseError;
use log::trace;
pub use session::MemorySession;
use tokio::sync::Mutex;

use crate::{
    db::traits::FulfillmentDatabase,
    db_types::{
        InventoryRecord,
        Mutation,
        MutationId,
        MutationStatusUpdate,
        Order,
        OrderId,
        OrderStatusUpdate,
        PaymentProof,
        ProductId,
        StockJournalEntry,
        Store,
        StoreId,
    },
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub stores: BTreeMap<StoreId, Store>,
    pub inventories: BTreeMap<(StoreId, ProductId), InventoryRecord>,
    pub journal: Vec<StockJournalEntry>,
    pub mutations: BTreeMap<MutationId, Mutation>,
    pub mutation_updates: Vec<MutationStatusUpdate>,
    pub orders: BTreeMap<OrderId, Order>,
    pub order_updates: Vec<OrderStatusUpdate>,
    pub payment_proofs: BTreeMap<OrderId, PaymentProof>,
    last_id: i64,
    /// Makes every rollback report an error after restoring the snapshot.
    #[cfg(test)]
    pub fail_rollbacks: bool,
}

impl MemoryState {
    /// A single id sequence shared by every table. The counter is part of the snapshot, so ids handed out in a
    /// rolled back session are reused.
    pub fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryDatabase")
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn fail_rollbacks(&self) {
        self.state.lock().await.fail_rollbacks = true;
    }
}

impl FulfillmentDatabase for MemoryDatabase {
    type Error = MemoryDatabaseError;
    type Session = MemorySession;

    fn url(&self) -> &str {
        "memory://"
    }

    async fn begin(&self) -> Result<Self::Session, Self::Error> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        trace!("🗃️ Memory session started");
        Ok(MemorySession::new(guard))
    }
}
