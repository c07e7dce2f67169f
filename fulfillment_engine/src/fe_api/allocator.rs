//! The fulfillment allocator sources every line item of an order from store inventory.
//!
//! For each line item, in order:
//! 1. As much as possible is deducted from the order's nearest store.
//! 2. Any remainder is drawn from alternate stores holding the product, nearest to the delivery point first, up to
//!    `max_alternate_stores` of them. Each contributing alternate store gets a `REQUESTED` mutation towards the
//!    nearest store, and the units it contributes are deducted from its stock.
//! 3. If the remainder cannot be covered, allocation fails with [`FulfillmentError::InsufficientStoreCapacity`].
//!
//! The whole pass runs in one session. A failure on any line item rolls back every deduction and mutation of the
//! pass, so callers never observe a partially allocated order.
use std::fmt::Debug;

use log::*;
use storefront_common::{GeoPoint, Quantity};

use crate::{
    config::EngineConfig,
    db::traits::{DatabaseSession, FulfillmentDatabase, InventoryManagement, MutationManagement, StoreDirectory},
    db_types::{Actor, NewMutation, OrderId, OrderLineItem, StockAdjustment, StoreId, UserId},
    events::{AllocationFailedEvent, EventProducers, MutationRequestedEvent, OrderAllocatedEvent},
    fe_api::{
        allocation_objects::{AllocationOutcome, AllocationReport, AllocationTarget, Deduction, LineAllocation},
        errors::FulfillmentError,
        inventory_ledger::{adjust_stock, check_availability, ensure_store_exists},
        mutation_workflow::create_mutation,
        store_locator::rank_candidate_stores,
    },
};

pub const DEFAULT_MAX_ALTERNATE_STORES: usize = 3;

/// Allocates the line items inside an open session. Nothing is committed here.
pub(crate) async fn allocate_in_session<S>(
    session: &mut S,
    target: &AllocationTarget,
    line_items: &[OrderLineItem],
    max_alternate_stores: usize,
) -> Result<AllocationOutcome, FulfillmentError>
where
    S: InventoryManagement + StoreDirectory + MutationManagement,
{
    ensure_store_exists(session, target.nearest_store_id).await?;
    let mut outcome = AllocationOutcome { report: AllocationReport::new(target.order_id), requested_mutations: vec![] };
    for item in line_items {
        if !item.final_quantity.is_positive() {
            debug!(
                "🧮️ Order {}: skipping product {} with quantity {}",
                target.order_id, item.product_id, item.final_quantity
            );
            continue;
        }
        let line = allocate_line_item(session, target, item, max_alternate_stores, &mut outcome).await?;
        outcome.report.lines.push(line);
    }
    Ok(outcome)
}

async fn allocate_line_item<S>(
    session: &mut S,
    target: &AllocationTarget,
    item: &OrderLineItem,
    max_alternate_stores: usize,
    outcome: &mut AllocationOutcome,
) -> Result<LineAllocation, FulfillmentError>
where
    S: InventoryManagement + StoreDirectory + MutationManagement,
{
    let product_id = item.product_id;
    let nearest = target.nearest_store_id;
    let customer = Actor::customer(target.customer_id);
    let mut line = LineAllocation::new(product_id, item.final_quantity);

    let availability = check_availability(session, nearest, product_id, item.final_quantity).await?;
    let local = availability.deductible();
    if local.is_positive() {
        let deduction = StockAdjustment::new(nearest, product_id, -local, customer)
            .for_order(target.order_id)
            .with_reason("allocated to order");
        adjust_stock(session, &deduction).await?;
        line.deductions.push(Deduction { store_id: nearest, quantity: local });
    }
    let mut remaining = item.final_quantity - local;
    if !remaining.is_positive() {
        trace!("🧮️ Order {}: product {product_id} fully supplied by store {nearest}", target.order_id);
        return Ok(line);
    }

    debug!(
        "🧮️ Order {}: store {nearest} is short {remaining} of product {product_id}. Looking for alternate stores.",
        target.order_id
    );
    let candidates = rank_candidate_stores(session, &target.delivery, product_id, Some(nearest)).await?;
    for candidate in candidates.into_iter().take(max_alternate_stores) {
        let from = candidate.store.id;
        let take = candidate.stock.min(remaining);
        let description = format!(
            "Request for mutation of {take} items from store {} to {}",
            from.value(),
            nearest.value()
        );
        let request =
            NewMutation::new(from, nearest, customer, description).for_order(target.order_id, product_id, take);
        let created = create_mutation(session, request).await?;
        let deduction = StockAdjustment::new(from, product_id, -take, customer)
            .for_order(target.order_id)
            .with_reason(format!("transfer to store {} requested", nearest.value()));
        adjust_stock(session, &deduction).await?;
        line.deductions.push(Deduction { store_id: from, quantity: take });
        line.mutation_ids.push(created.mutation.id);
        outcome.requested_mutations.push(created);
        remaining -= take;
        if !remaining.is_positive() {
            return Ok(line);
        }
    }
    warn!(
        "🧮️ Order {}: no combination of stores can supply product {product_id}. {remaining} units are missing.",
        target.order_id
    );
    Err(FulfillmentError::InsufficientStoreCapacity { product_id, shortfall: remaining })
}

/// `FulfillmentAllocator` runs one allocation pass per call, in its own session.
pub struct FulfillmentAllocator<B> {
    db: B,
    producers: EventProducers,
    max_alternate_stores: usize,
}

impl<B> Debug for FulfillmentAllocator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentAllocator (max {} alternate stores)", self.max_alternate_stores)
    }
}

impl<B> FulfillmentAllocator<B>
where B: FulfillmentDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, max_alternate_stores: DEFAULT_MAX_ALTERNATE_STORES }
    }

    pub fn from_config(db: B, producers: EventProducers, config: &EngineConfig) -> Self {
        debug!("🧮️ Allocating from at most {} alternate stores per line item", config.max_alternate_stores);
        Self::new(db, producers).with_max_alternate_stores(config.max_alternate_stores)
    }

    /// Limits how many alternate stores may contribute to a single line item. Values below 1 are raised to 1.
    pub fn with_max_alternate_stores(mut self, max_alternate_stores: usize) -> Self {
        self.max_alternate_stores = max_alternate_stores.max(1);
        self
    }

    pub fn max_alternate_stores(&self) -> usize {
        self.max_alternate_stores
    }

    /// Sources every line item's final quantity from store inventory, or fails without changing anything.
    ///
    /// On success, a [`MutationRequestedEvent`] is published for each mutation created and an [`OrderAllocatedEvent`]
    /// for the order. On failure, an [`AllocationFailedEvent`] is published.
    pub async fn allocate_stock_for_order(
        &self,
        line_items: &[OrderLineItem],
        delivery: GeoPoint,
        nearest_store_id: StoreId,
        order_id: OrderId,
        customer_id: UserId,
    ) -> Result<AllocationReport, FulfillmentError> {
        let target = AllocationTarget { order_id, customer_id, nearest_store_id, delivery };
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let result = allocate_in_session(&mut session, &target, line_items, self.max_alternate_stores).await;
        match result {
            Ok(outcome) => {
                session.commit().await.map_err(FulfillmentError::database)?;
                info!(
                    "🧮️ Order {order_id} allocated: {} line items, {} mutations requested",
                    outcome.report.lines.len(),
                    outcome.requested_mutations.len()
                );
                let report = outcome.report.clone();
                publish_allocation_events(&self.producers, outcome).await;
                Ok(report)
            },
            Err(e) => {
                if let Err(rb) = session.rollback().await {
                    error!("🧮️ Could not roll back the allocation of order {order_id}: {rb}");
                }
                warn!("🧮️ Allocation of order {order_id} failed and was rolled back: {e}");
                self.producers.publish_allocation_failed(AllocationFailedEvent::new(order_id, e.to_string())).await;
                Err(e)
            },
        }
    }
}

pub(crate) async fn publish_allocation_events(producers: &EventProducers, outcome: AllocationOutcome) {
    for created in outcome.requested_mutations {
        producers.publish_mutation_requested(MutationRequestedEvent::new(created.mutation, created.initial_update)).await;
    }
    let order_id = outcome.report.order_id;
    producers.publish_order_allocated(OrderAllocatedEvent::new(order_id, outcome.report)).await;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db::memory::MemoryDatabase,
        db_types::{MutationQueryFilter, MutationStatus, NewStore, ProductId},
    };

    const P42: ProductId = ProductId(42);

    struct Fixture {
        db: MemoryDatabase,
        stores: Vec<StoreId>,
    }

    /// Stores are created along a line heading away from the delivery point, so their ids match their distance rank.
    async fn fixture(stock: &[i64]) -> Fixture {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let mut stores = Vec::new();
        for (i, qty) in stock.iter().enumerate() {
            let location = GeoPoint::new(-6.2 - 0.1 * i as f64, 106.8).unwrap();
            let store = session.insert_store(NewStore::new(format!("Store {i}"), location)).await.unwrap();
            if *qty > 0 {
                let adj = StockAdjustment::new(store.id, P42, Quantity::from(*qty), Actor::system());
                session.apply_stock_delta(&adj).await.unwrap();
            }
            stores.push(store.id);
        }
        session.commit().await.unwrap();
        Fixture { db, stores }
    }

    impl Fixture {
        async fn stock(&self, store: usize) -> Quantity {
            let mut session = self.db.begin().await.unwrap();
            let record = session.fetch_stock(self.stores[store], P42).await.unwrap();
            record.map(|r| r.stock).unwrap_or_default()
        }

        async fn mutation_count(&self) -> usize {
            let mut session = self.db.begin().await.unwrap();
            session.fetch_mutations(MutationQueryFilter::default()).await.unwrap().len()
        }

        async fn allocate(&self, max_alt: usize, items: &[i64]) -> Result<AllocationReport, FulfillmentError> {
            let allocator =
                FulfillmentAllocator::new(self.db.clone(), EventProducers::default()).with_max_alternate_stores(max_alt);
            let items = items.iter().map(|q| OrderLineItem::new(P42, Quantity::from(*q))).collect::<Vec<_>>();
            let delivery = GeoPoint::new(-6.2, 106.8).unwrap();
            allocator.allocate_stock_for_order(&items, delivery, self.stores[0], OrderId(1), UserId(7)).await
        }
    }

    #[test]
    fn fan_out_comes_from_config() {
        let config = EngineConfig::default().with_max_alternate_stores(2);
        let allocator = FulfillmentAllocator::from_config(MemoryDatabase::new(), EventProducers::default(), &config);
        assert_eq!(allocator.max_alternate_stores(), 2);
        let allocator = FulfillmentAllocator::new(MemoryDatabase::new(), EventProducers::default());
        assert_eq!(allocator.max_alternate_stores(), DEFAULT_MAX_ALTERNATE_STORES);
    }

    #[tokio::test]
    async fn nearest_store_only() {
        let f = fixture(&[10, 10]).await;
        let report = f.allocate(3, &[4]).await.unwrap();
        assert!(report.is_local());
        assert_eq!(f.stock(0).await, Quantity::from(6));
        assert_eq!(f.stock(1).await, Quantity::from(10));
        assert_eq!(f.mutation_count().await, 0);
    }

    #[tokio::test]
    async fn split_between_nearest_and_alternate() {
        let f = fixture(&[3, 10]).await;
        let report = f.allocate(1, &[5]).await.unwrap();
        assert_eq!(report.deducted_from(f.stores[0]), Quantity::from(3));
        assert_eq!(report.deducted_from(f.stores[1]), Quantity::from(2));
        assert_eq!(f.stock(0).await, Quantity::ZERO);
        assert_eq!(f.stock(1).await, Quantity::from(8));
        let mut session = f.db.begin().await.unwrap();
        let mutations = session.fetch_mutations(MutationQueryFilter::default()).await.unwrap();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].from_store_id, f.stores[1]);
        assert_eq!(mutations[0].to_store_id, f.stores[0]);
        assert_eq!(mutations[0].status, MutationStatus::Requested);
        let history = session.fetch_status_updates(mutations[0].id).await.unwrap();
        assert_eq!(history.len(), 1);
        let expected = format!("Request for mutation of 2 items from store {} to {}", f.stores[1].0, f.stores[0].0);
        assert_eq!(history[0].description, expected);
    }

    #[tokio::test]
    async fn fans_out_to_several_alternates() {
        let f = fixture(&[1, 1, 0, 2, 5]).await;
        let report = f.allocate(3, &[6]).await.unwrap();
        let sources = report.lines[0].deductions.iter().map(|d| (d.store_id, d.quantity.value())).collect::<Vec<_>>();
        assert_eq!(sources, vec![(f.stores[0], 1), (f.stores[1], 1), (f.stores[3], 2), (f.stores[4], 2)]);
        assert_eq!(report.mutation_ids().len(), 3);
        assert_eq!(f.stock(4).await, Quantity::from(3));
    }

    #[tokio::test]
    async fn fan_out_limit_is_respected() {
        let f = fixture(&[1, 1, 1, 1]).await;
        let err = f.allocate(2, &[4]).await.unwrap_err();
        assert_eq!(err, FulfillmentError::InsufficientStoreCapacity { product_id: P42, shortfall: Quantity::from(1) });
        for i in 0..4 {
            assert_eq!(f.stock(i).await, Quantity::from(1));
        }
        assert_eq!(f.mutation_count().await, 0);
    }

    #[tokio::test]
    async fn no_alternate_changes_nothing() {
        let f = fixture(&[0]).await;
        let err = f.allocate(3, &[2]).await.unwrap_err();
        assert_eq!(err, FulfillmentError::InsufficientStoreCapacity { product_id: P42, shortfall: Quantity::from(2) });
        assert!(f.stock(0).await.is_zero());
    }

    #[tokio::test]
    async fn later_failure_rolls_back_earlier_items() {
        let f = fixture(&[5, 2]).await;
        let err = f.allocate(3, &[4, 4]).await.unwrap_err();
        assert_eq!(err, FulfillmentError::InsufficientStoreCapacity { product_id: P42, shortfall: Quantity::from(1) });
        assert_eq!(f.stock(0).await, Quantity::from(5));
        assert_eq!(f.stock(1).await, Quantity::from(2));
        assert_eq!(f.mutation_count().await, 0);
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let f = fixture(&[1]).await;
        let report = f.allocate(3, &[0, 1]).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert!(f.stock(0).await.is_zero());
    }

    #[tokio::test]
    async fn unknown_nearest_store() {
        let f = fixture(&[1]).await;
        let allocator = FulfillmentAllocator::new(f.db.clone(), EventProducers::default());
        let items = [OrderLineItem::new(P42, Quantity::from(1))];
        let delivery = GeoPoint::new(-6.2, 106.8).unwrap();
        let err = allocator.allocate_stock_for_order(&items, delivery, StoreId(77), OrderId(1), UserId(7)).await;
        assert_eq!(err.unwrap_err(), FulfillmentError::StoreNotFound(StoreId(77)));
    }
}
