use std::collections::btree_map::Entry;

use chrono::Utc;
use log::{debug, trace};
use storefront_common::Quantity;
use tokio::sync::OwnedMutexGuard;

use super::{MemoryDatabaseError, MemoryState};
use crate::{
    db::traits::{
        DatabaseSession,
        InsertMutationResult,
        InventoryManagement,
        MutationManagement,
        OrderManagement,
        StoreDirectory,
    },
    db_types::{
        Actor,
        InventoryRecord,
        Mutation,
        MutationId,
        MutationQueryFilter,
        MutationStatus,
        MutationStatusUpdate,
        NewMutation,
        NewMutationStatusUpdate,
        NewOrder,
        NewOrderStatusUpdate,
        NewStore,
        Order,
        OrderId,
        OrderQueryFilter,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentProof,
        PaymentStatus,
        ProductId,
        StockAdjustment,
        StockJournalEntry,
        StockUpdateResult,
        Store,
        StoreId,
        StoreStock,
        UserId,
    },
};

pub struct MemorySession {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    snapshot: Option<MemoryState>,
}

impl MemorySession {
    pub(crate) fn new(guard: OwnedMutexGuard<MemoryState>) -> Self {
        let snapshot = guard.clone();
        Self { guard: Some(guard), snapshot: Some(snapshot) }
    }

    fn state(&mut self) -> Result<&mut MemoryState, MemoryDatabaseError> {
        self.guard.as_deref_mut().ok_or(MemoryDatabaseError::SessionClosed)
    }

    fn restore(&mut self) {
        if let (Some(guard), Some(snapshot)) = (self.guard.as_mut(), self.snapshot.take()) {
            **guard = snapshot;
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.guard.is_some() && self.snapshot.is_some() {
            trace!("🗃️ Memory session dropped without commit. Discarding its changes.");
            self.restore();
        }
    }
}

impl DatabaseSession for MemorySession {
    type Error = MemoryDatabaseError;

    async fn commit(mut self) -> Result<(), Self::Error> {
        if self.guard.is_none() {
            return Err(MemoryDatabaseError::SessionClosed);
        }
        self.snapshot = None;
        self.guard = None;
        trace!("🗃️ Memory session committed");
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), Self::Error> {
        if self.guard.is_none() {
            return Err(MemoryDatabaseError::SessionClosed);
        }
        self.restore();
        #[cfg(test)]
        if self.guard.as_ref().is_some_and(|state| state.fail_rollbacks) {
            self.guard = None;
            return Err(MemoryDatabaseError::SessionClosed);
        }
        self.guard = None;
        trace!("🗃️ Memory session rolled back");
        Ok(())
    }
}

fn push_order_update(state: &mut MemoryState, order_id: OrderId, update: NewOrderStatusUpdate) {
    let id = state.next_id();
    state.order_updates.push(OrderStatusUpdate {
        id,
        order_id,
        status: update.status,
        actor: update.actor,
        note: update.note,
        created_at: Utc::now(),
    });
}

fn push_mutation_update(
    state: &mut MemoryState,
    mutation_id: MutationId,
    update: NewMutationStatusUpdate,
) -> MutationStatusUpdate {
    let id = state.next_id();
    let entry = MutationStatusUpdate {
        id,
        mutation_id,
        creator_id: update.actor.id,
        status: update.status,
        description: update.description,
        created_at: Utc::now(),
    };
    state.mutation_updates.push(entry.clone());
    entry
}

impl InventoryManagement for MemorySession {
    type Error = MemoryDatabaseError;

    async fn fetch_stock(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, Self::Error> {
        Ok(self.state()?.inventories.get(&(store_id, product_id)).cloned())
    }

    async fn apply_stock_delta(&mut self, adjustment: &StockAdjustment) -> Result<StockUpdateResult, Self::Error> {
        let state = self.state()?;
        let key = (adjustment.store_id, adjustment.product_id);
        if !state.stores.contains_key(&adjustment.store_id) {
            return Err(MemoryDatabaseError::UnknownStore(adjustment.store_id));
        }
        let now = Utc::now();
        let record = match state.inventories.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) if adjustment.delta.is_positive() => entry.insert(InventoryRecord {
                store_id: adjustment.store_id,
                product_id: adjustment.product_id,
                stock: Quantity::ZERO,
                updated_at: now,
            }),
            Entry::Vacant(_) => {
                debug!("📦️ No stock record for product {} at store {}", adjustment.product_id, adjustment.store_id);
                return Ok(StockUpdateResult::NoRecord);
            },
        };
        let Some(new_stock) = record.stock.checked_add(adjustment.delta) else {
            debug!(
                "📦️ Stock adjustment of {} for product {} at store {} overflows {}",
                adjustment.delta, adjustment.product_id, adjustment.store_id, record.stock
            );
            return Ok(StockUpdateResult::Overflow { current: record.stock });
        };
        if new_stock.is_negative() {
            debug!(
                "📦️ Stock adjustment of {} for product {} at store {} would leave {new_stock}",
                adjustment.delta, adjustment.product_id, adjustment.store_id
            );
            return Ok(StockUpdateResult::Insufficient { available: record.stock });
        }
        record.stock = new_stock;
        record.updated_at = now;
        let updated = record.clone();
        let id = state.next_id();
        state.journal.push(StockJournalEntry {
            id,
            store_id: adjustment.store_id,
            product_id: adjustment.product_id,
            delta: adjustment.delta,
            resulting_stock: new_stock,
            order_id: adjustment.order_id,
            actor: adjustment.actor,
            reason: adjustment.reason.clone(),
            created_at: now,
        });
        Ok(StockUpdateResult::Applied(updated))
    }

    async fn fetch_stock_journal_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<StockJournalEntry>, Self::Error> {
        let state = self.state()?;
        Ok(state.journal.iter().filter(|e| e.order_id == Some(order_id)).cloned().collect())
    }
}

impl StoreDirectory for MemorySession {
    type Error = MemoryDatabaseError;

    async fn insert_store(&mut self, store: NewStore) -> Result<Store, Self::Error> {
        let state = self.state()?;
        let id = StoreId(state.next_id());
        let store = Store { id, name: store.name, location: store.location, created_at: Utc::now() };
        state.stores.insert(id, store.clone());
        Ok(store)
    }

    async fn fetch_store(&mut self, store_id: StoreId) -> Result<Option<Store>, Self::Error> {
        Ok(self.state()?.stores.get(&store_id).cloned())
    }

    async fn fetch_stores(&mut self) -> Result<Vec<Store>, Self::Error> {
        Ok(self.state()?.stores.values().cloned().collect())
    }

    async fn fetch_stores_stocking(
        &mut self,
        product_id: ProductId,
        min_stock: Quantity,
    ) -> Result<Vec<StoreStock>, Self::Error> {
        let state = self.state()?;
        let result = state
            .inventories
            .values()
            .filter(|r| r.product_id == product_id && r.stock >= min_stock)
            .filter_map(|r| {
                state.stores.get(&r.store_id).map(|s| StoreStock { store: s.clone(), product_id, stock: r.stock })
            })
            .collect();
        Ok(result)
    }
}

impl MutationManagement for MemorySession {
    type Error = MemoryDatabaseError;

    async fn insert_mutation(&mut self, mutation: NewMutation) -> Result<InsertMutationResult, Self::Error> {
        let state = self.state()?;
        for store_id in [mutation.from_store_id, mutation.to_store_id] {
            if !state.stores.contains_key(&store_id) {
                return Err(MemoryDatabaseError::UnknownStore(store_id));
            }
        }
        if mutation.from_store_id == mutation.to_store_id {
            return Err(MemoryDatabaseError::ConstraintViolation(format!(
                "mutation source and destination are both store {}",
                mutation.from_store_id
            )));
        }
        let now = Utc::now();
        let id = MutationId(state.next_id());
        let record = Mutation {
            id,
            from_store_id: mutation.from_store_id,
            to_store_id: mutation.to_store_id,
            status: MutationStatus::Requested,
            product_id: mutation.product_id,
            quantity: mutation.quantity,
            order_id: mutation.order_id,
            created_at: now,
            updated_at: now,
        };
        state.mutations.insert(id, record.clone());
        let update = NewMutationStatusUpdate::new(MutationStatus::Requested, mutation.requested_by, mutation.description);
        let initial_update = push_mutation_update(state, id, update);
        Ok(InsertMutationResult { mutation: record, initial_update })
    }

    async fn fetch_mutation(&mut self, id: MutationId) -> Result<Option<Mutation>, Self::Error> {
        Ok(self.state()?.mutations.get(&id).cloned())
    }

    async fn fetch_status_updates(&mut self, id: MutationId) -> Result<Vec<MutationStatusUpdate>, Self::Error> {
        let state = self.state()?;
        Ok(state.mutation_updates.iter().filter(|u| u.mutation_id == id).cloned().collect())
    }

    async fn transition_mutation(
        &mut self,
        id: MutationId,
        expected: MutationStatus,
        update: NewMutationStatusUpdate,
    ) -> Result<Option<Mutation>, Self::Error> {
        let state = self.state()?;
        let Some(mutation) = state.mutations.get_mut(&id).filter(|m| m.status == expected) else {
            return Ok(None);
        };
        mutation.status = update.status;
        mutation.updated_at = Utc::now();
        let result = mutation.clone();
        push_mutation_update(state, id, update);
        Ok(Some(result))
    }

    async fn fetch_mutations(&mut self, filter: MutationQueryFilter) -> Result<Vec<Mutation>, Self::Error> {
        let state = self.state()?;
        Ok(state.mutations.values().filter(|m| filter.matches(m)).cloned().collect())
    }
}

impl OrderManagement for MemorySession {
    type Error = MemoryDatabaseError;

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, Self::Error> {
        let state = self.state()?;
        if !state.stores.contains_key(&order.nearest_store_id) {
            return Err(MemoryDatabaseError::UnknownStore(order.nearest_store_id));
        }
        let id = OrderId(state.next_id());
        let status = OrderStatusType::AwaitingPayment;
        let record = Order {
            id,
            customer_id: order.customer_id,
            nearest_store_id: order.nearest_store_id,
            delivery: order.delivery,
            status,
            line_items: order.line_items,
            allocated_at: None,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        state.orders.insert(id, record.clone());
        push_order_update(state, id, NewOrderStatusUpdate::new(status, Actor::customer(order.customer_id)));
        Ok(record)
    }

    async fn fetch_order(&mut self, order_id: OrderId) -> Result<Option<Order>, Self::Error> {
        Ok(self.state()?.orders.get(&order_id).cloned())
    }

    async fn fetch_orders(&mut self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let state = self.state()?;
        let mut orders = state.orders.values().filter(|o| filter.matches(o)).cloned().collect::<Vec<Order>>();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatusType,
        update: NewOrderStatusUpdate,
    ) -> Result<Option<Order>, Self::Error> {
        let state = self.state()?;
        let Some(order) = state.orders.get_mut(&order_id).filter(|o| o.status == expected) else {
            return Ok(None);
        };
        order.status = update.status;
        order.updated_at = Utc::now();
        let result = order.clone();
        push_order_update(state, order_id, update);
        Ok(Some(result))
    }

    async fn append_order_note(&mut self, order_id: OrderId, update: NewOrderStatusUpdate) -> Result<(), Self::Error> {
        let state = self.state()?;
        if !state.orders.contains_key(&order_id) {
            return Err(MemoryDatabaseError::UnknownOrder(order_id));
        }
        push_order_update(state, order_id, update);
        Ok(())
    }

    async fn fetch_order_status_history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusUpdate>, Self::Error> {
        let state = self.state()?;
        Ok(state.order_updates.iter().filter(|u| u.order_id == order_id).cloned().collect())
    }

    async fn mark_order_allocated(&mut self, order_id: OrderId) -> Result<bool, Self::Error> {
        let state = self.state()?;
        match state.orders.get_mut(&order_id) {
            Some(order) if order.allocated_at.is_none() => {
                let now = Utc::now();
                order.allocated_at = Some(now);
                order.updated_at = now;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn upsert_payment_proof(
        &mut self,
        order_id: OrderId,
        image_ref: &str,
        uploaded_by: UserId,
    ) -> Result<PaymentProof, Self::Error> {
        let state = self.state()?;
        if !state.orders.contains_key(&order_id) {
            return Err(MemoryDatabaseError::UnknownOrder(order_id));
        }
        let now = Utc::now();
        let created_at = state.payment_proofs.get(&order_id).map_or(now, |p| p.created_at);
        let proof = PaymentProof {
            order_id,
            image_ref: image_ref.to_string(),
            status: PaymentStatus::Pending,
            uploaded_by,
            reviewed_by: None,
            created_at,
            updated_at: now,
        };
        state.payment_proofs.insert(order_id, proof.clone());
        Ok(proof)
    }

    async fn fetch_payment_proof(&mut self, order_id: OrderId) -> Result<Option<PaymentProof>, Self::Error> {
        Ok(self.state()?.payment_proofs.get(&order_id).cloned())
    }

    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        status: PaymentStatus,
        reviewed_by: UserId,
    ) -> Result<Option<PaymentProof>, Self::Error> {
        let state = self.state()?;
        let Some(proof) = state.payment_proofs.get_mut(&order_id) else {
            return Ok(None);
        };
        proof.status = status;
        proof.reviewed_by = Some(reviewed_by);
        proof.updated_at = Utc::now();
        Ok(Some(proof.clone()))
    }
}

#[cfg(test)]
mod test {
    use storefront_common::GeoPoint;

    use super::*;
    use crate::db::{memory::MemoryDatabase, traits::FulfillmentDatabase};

    async fn seeded() -> (MemoryDatabase, StoreId) {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let location = GeoPoint::new(-6.2, 106.8).unwrap();
        let store = session.insert_store(NewStore::new("Jakarta", location)).await.unwrap();
        let restock = StockAdjustment::new(store.id, ProductId(42), Quantity::from(5), Actor::admin(UserId(1)));
        session.apply_stock_delta(&restock).await.unwrap();
        session.commit().await.unwrap();
        (db, store.id)
    }

    #[tokio::test]
    async fn dropped_session_discards_changes() {
        let (db, store_id) = seeded().await;
        {
            let mut session = db.begin().await.unwrap();
            let deduct = StockAdjustment::new(store_id, ProductId(42), Quantity::from(-5), Actor::system());
            let result = session.apply_stock_delta(&deduct).await.unwrap();
            assert!(matches!(result, StockUpdateResult::Applied(r) if r.stock.is_zero()));
        }
        let mut session = db.begin().await.unwrap();
        let record = session.fetch_stock(store_id, ProductId(42)).await.unwrap().unwrap();
        assert_eq!(record.stock, Quantity::from(5));
    }

    #[tokio::test]
    async fn rollback_discards_changes() {
        let (db, store_id) = seeded().await;
        let mut session = db.begin().await.unwrap();
        let deduct = StockAdjustment::new(store_id, ProductId(42), Quantity::from(-2), Actor::system());
        session.apply_stock_delta(&deduct).await.unwrap();
        session.rollback().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let record = session.fetch_stock(store_id, ProductId(42)).await.unwrap().unwrap();
        assert_eq!(record.stock, Quantity::from(5));
    }

    #[tokio::test]
    async fn deductions_never_go_negative() {
        let (db, store_id) = seeded().await;
        let mut session = db.begin().await.unwrap();
        let deduct = StockAdjustment::new(store_id, ProductId(42), Quantity::from(-6), Actor::system());
        let result = session.apply_stock_delta(&deduct).await.unwrap();
        assert_eq!(result, StockUpdateResult::Insufficient { available: Quantity::from(5) });
        let missing = StockAdjustment::new(store_id, ProductId(7), Quantity::from(-1), Actor::system());
        let result = session.apply_stock_delta(&missing).await.unwrap();
        assert_eq!(result, StockUpdateResult::NoRecord);
    }

    #[tokio::test]
    async fn restocks_never_overflow() {
        let (db, store_id) = seeded().await;
        let mut session = db.begin().await.unwrap();
        let restock = StockAdjustment::new(store_id, ProductId(42), Quantity::from(i64::MAX), Actor::system());
        let result = session.apply_stock_delta(&restock).await.unwrap();
        assert_eq!(result, StockUpdateResult::Overflow { current: Quantity::from(5) });
        let record = session.fetch_stock(store_id, ProductId(42)).await.unwrap().unwrap();
        assert_eq!(record.stock, Quantity::from(5));
    }

    #[tokio::test]
    async fn mutation_compare_and_set() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let location = GeoPoint::new(-6.2, 106.8).unwrap();
        let a = session.insert_store(NewStore::new("A", location)).await.unwrap();
        let b = session.insert_store(NewStore::new("B", location)).await.unwrap();
        let admin = Actor::admin(UserId(1));
        let inserted = session.insert_mutation(NewMutation::new(a.id, b.id, admin, "please")).await.unwrap();
        assert_eq!(inserted.initial_update.status, MutationStatus::Requested);
        let id = inserted.mutation.id;
        let approve = NewMutationStatusUpdate::new(MutationStatus::Approved, admin, "ok");
        let stale = session.transition_mutation(id, MutationStatus::Approved, approve.clone()).await.unwrap();
        assert!(stale.is_none());
        let approved = session.transition_mutation(id, MutationStatus::Requested, approve).await.unwrap().unwrap();
        assert_eq!(approved.status, MutationStatus::Approved);
        assert_eq!(session.fetch_status_updates(id).await.unwrap().len(), 2);
        let same = session.insert_mutation(NewMutation::new(a.id, a.id, admin, "loop")).await;
        assert!(matches!(same, Err(MemoryDatabaseError::ConstraintViolation(_))));
    }
}
