use std::{collections::BTreeMap, fmt::Debug};

use log::*;
use storefront_common::Quantity;

use crate::{
    config::EngineConfig,
    db::traits::{DatabaseSession, FulfillmentDatabase, InventoryManagement, MutationManagement, OrderManagement},
    db_types::{
        Actor,
        MutationQueryFilter,
        MutationStatus,
        NewOrderStatusUpdate,
        Order,
        OrderId,
        OrderQueryFilter,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentProof,
        PaymentStatus,
        ProductId,
        StockAdjustment,
        StoreId,
        UserId,
    },
    events::{AllocationFailedEvent, EventProducers, MutationStatusChangedEvent},
    fe_api::{
        allocation_objects::{AllocationReport, AllocationTarget},
        allocator::{allocate_in_session, publish_allocation_events, DEFAULT_MAX_ALTERNATE_STORES},
        errors::OrderFlowError,
        inventory_ledger::adjust_stock,
        mutation_workflow::record_status_update,
    },
};

/// Moves the order from its current status to `to`, if the order status table allows it.
async fn change_status<S: OrderManagement>(
    session: &mut S,
    order_id: OrderId,
    to: OrderStatusType,
    update: NewOrderStatusUpdate,
) -> Result<Order, OrderFlowError> {
    let order = fetch_order(session, order_id).await?;
    let from = order.status;
    if !from.can_transition_to(to) {
        warn!("🔄️ {} tried to move order {order_id} from {from} to {to}", update.actor);
        return Err(OrderFlowError::InvalidStatusChange { order_id, from, to });
    }
    let actor = update.actor;
    match session.update_order_status(order_id, from, update).await.map_err(OrderFlowError::database)? {
        Some(order) => {
            info!("🔄️ Order {order_id} moved from {from} to {to} by {actor}");
            Ok(order)
        },
        None => {
            let latest = fetch_order(session, order_id).await?.status;
            warn!("🔄️ Order {order_id} changed to {latest} before it could move to {to}");
            Err(OrderFlowError::InvalidStatusChange { order_id, from: latest, to })
        },
    }
}

async fn fetch_order<S: OrderManagement>(session: &mut S, order_id: OrderId) -> Result<Order, OrderFlowError> {
    session
        .fetch_order(order_id)
        .await
        .map_err(OrderFlowError::database)?
        .ok_or(OrderFlowError::OrderNotFound(order_id))
}

/// `OrderFlowApi` drives an order through payment review, allocation, shipping and delivery.
///
/// | From                 | Allowed next statuses                                     |
/// |----------------------|-----------------------------------------------------------|
/// | AwaitingPayment      | AwaitingConfirmation (proof uploaded), Cancelled          |
/// | AwaitingConfirmation | Processing (approved), AwaitingPayment (rejected), Cancelled |
/// | Processing           | Shipped, Cancelled                                        |
/// | Shipped              | Confirmed                                                 |
///
/// Every change appends an [`OrderStatusUpdate`].
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    max_alternate_stores: usize,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, max_alternate_stores: DEFAULT_MAX_ALTERNATE_STORES }
    }

    pub fn from_config(db: B, producers: EventProducers, config: &EngineConfig) -> Self {
        Self::new(db, producers).with_max_alternate_stores(config.max_alternate_stores)
    }

    pub fn max_alternate_stores(&self) -> usize {
        self.max_alternate_stores
    }

    pub fn with_max_alternate_stores(mut self, max_alternate_stores: usize) -> Self {
        self.max_alternate_stores = max_alternate_stores.max(1);
        self
    }
}

impl<B> OrderFlowApi<B>
where B: FulfillmentDatabase
{
    pub async fn order(&self, order_id: OrderId) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let order = fetch_order(&mut session, order_id).await?;
        session.rollback().await.map_err(OrderFlowError::database)?;
        Ok(order)
    }

    /// The customer's orders matching `filter`, newest first.
    pub async fn orders_for_customer(
        &self,
        customer_id: UserId,
        filter: OrderQueryFilter,
    ) -> Result<Vec<Order>, OrderFlowError> {
        let filter = filter.with_customer_id(customer_id);
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let orders = session.fetch_orders(filter).await.map_err(OrderFlowError::database)?;
        session.rollback().await.map_err(OrderFlowError::database)?;
        trace!("🔄️ {} orders found for customer {customer_id}", orders.len());
        Ok(orders)
    }

    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<OrderStatusUpdate>, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        fetch_order(&mut session, order_id).await?;
        let history = session.fetch_order_status_history(order_id).await.map_err(OrderFlowError::database)?;
        session.rollback().await.map_err(OrderFlowError::database)?;
        Ok(history)
    }

    pub async fn payment_proof(&self, order_id: OrderId) -> Result<PaymentProof, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let proof = session.fetch_payment_proof(order_id).await.map_err(OrderFlowError::database)?;
        session.rollback().await.map_err(OrderFlowError::database)?;
        proof.ok_or(OrderFlowError::PaymentProofMissing(order_id))
    }

    /// Stores a reference to the uploaded proof of payment and moves the order to `AwaitingConfirmation`. A proof
    /// that was previously rejected is replaced.
    pub async fn submit_payment_proof(
        &self,
        order_id: OrderId,
        image_ref: &str,
        actor: Actor,
    ) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let update = NewOrderStatusUpdate::new(OrderStatusType::AwaitingConfirmation, actor).with_note("payment proof uploaded");
        let order = change_status(&mut session, order_id, OrderStatusType::AwaitingConfirmation, update).await?;
        session.upsert_payment_proof(order_id, image_ref, actor.id).await.map_err(OrderFlowError::database)?;
        session.commit().await.map_err(OrderFlowError::database)?;
        Ok(order)
    }

    pub async fn approve_payment(&self, order_id: OrderId, actor: Actor) -> Result<Order, OrderFlowError> {
        self.review_payment(order_id, actor, PaymentStatus::Approved, "payment approved").await
    }

    /// The proof is marked as rejected and the order goes back to `AwaitingPayment`, so that the customer can upload
    /// a new one.
    pub async fn reject_payment(&self, order_id: OrderId, actor: Actor, reason: &str) -> Result<Order, OrderFlowError> {
        let note = format!("payment rejected: {reason}");
        self.review_payment(order_id, actor, PaymentStatus::Rejected, &note).await
    }

    async fn review_payment(
        &self,
        order_id: OrderId,
        actor: Actor,
        verdict: PaymentStatus,
        note: &str,
    ) -> Result<Order, OrderFlowError> {
        let next = match verdict {
            PaymentStatus::Approved => OrderStatusType::Processing,
            _ => OrderStatusType::AwaitingPayment,
        };
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let update = NewOrderStatusUpdate::new(next, actor).with_note(note);
        let order = change_status(&mut session, order_id, next, update).await?;
        session
            .update_payment_status(order_id, verdict, actor.id)
            .await
            .map_err(OrderFlowError::database)?
            .ok_or(OrderFlowError::PaymentProofMissing(order_id))?;
        session.commit().await.map_err(OrderFlowError::database)?;
        Ok(order)
    }

    pub async fn ship_order(&self, order_id: OrderId, actor: Actor) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let update = NewOrderStatusUpdate::new(OrderStatusType::Shipped, actor);
        let order = change_status(&mut session, order_id, OrderStatusType::Shipped, update).await?;
        session.commit().await.map_err(OrderFlowError::database)?;
        Ok(order)
    }

    pub async fn confirm_delivery(&self, order_id: OrderId, actor: Actor) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let update = NewOrderStatusUpdate::new(OrderStatusType::Confirmed, actor);
        let order = change_status(&mut session, order_id, OrderStatusType::Confirmed, update).await?;
        session.commit().await.map_err(OrderFlowError::database)?;
        Ok(order)
    }

    /// Cancels the order. Every unit deducted for the order goes back to the store it was taken from, and transfer
    /// requests for the order that are still `REQUESTED` are rejected.
    pub async fn cancel_order(&self, order_id: OrderId, actor: Actor, reason: &str) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let update = NewOrderStatusUpdate::new(OrderStatusType::Cancelled, actor).with_note(reason);
        let order = change_status(&mut session, order_id, OrderStatusType::Cancelled, update).await?;

        let journal = session.fetch_stock_journal_for_order(order_id).await.map_err(OrderFlowError::database)?;
        let mut net = BTreeMap::<(StoreId, ProductId), Quantity>::new();
        for entry in journal {
            *net.entry((entry.store_id, entry.product_id)).or_default() += entry.delta;
        }
        for ((store_id, product_id), delta) in net.into_iter().filter(|(_, d)| d.is_negative()) {
            let restock = StockAdjustment::new(store_id, product_id, -delta, actor)
                .for_order(order_id)
                .with_reason("order cancelled");
            adjust_stock(&mut session, &restock).await?;
        }

        let outstanding = MutationQueryFilter::default().with_order_id(order_id).with_status(MutationStatus::Requested);
        let pending = session.fetch_mutations(outstanding).await.map_err(OrderFlowError::database)?;
        let mut rejected = Vec::with_capacity(pending.len());
        for mutation in pending {
            let description = format!("order {} cancelled", order_id.value());
            let changed =
                record_status_update(&mut session, mutation.id, MutationStatus::Rejected, actor, &description).await?;
            rejected.push(changed);
        }
        session.commit().await.map_err(OrderFlowError::database)?;
        info!("🔄️ Order {order_id} cancelled by {actor}. {} transfer requests rejected.", rejected.len());
        for (mutation, old_status) in rejected {
            self.producers.publish_mutation_status_changed(MutationStatusChangedEvent::new(mutation, old_status)).await;
        }
        Ok(order)
    }

    /// Allocates stock to the order. This happens once per order, and never to a confirmed or cancelled order.
    ///
    /// If allocation fails, nothing is deducted, the order status is unchanged and a note
    /// `allocation failed: <reason>` is added to its history so that it can be picked up for manual attention.
    pub async fn accept_order(&self, order_id: OrderId) -> Result<AllocationReport, OrderFlowError> {
        let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
        let order = fetch_order(&mut session, order_id).await?;
        if order.allocated_at.is_some() {
            return Err(OrderFlowError::AlreadyAllocated(order_id));
        }
        if order.status.is_finished() {
            warn!("🔄️ Order {order_id} is {} and will not be allocated", order.status);
            return Err(OrderFlowError::OrderClosed { order_id, status: order.status });
        }
        let target = AllocationTarget::from(&order);
        match allocate_in_session(&mut session, &target, &order.line_items, self.max_alternate_stores).await {
            Ok(outcome) => {
                if !session.mark_order_allocated(order_id).await.map_err(OrderFlowError::database)? {
                    session.rollback().await.map_err(OrderFlowError::database)?;
                    return Err(OrderFlowError::AlreadyAllocated(order_id));
                }
                session.commit().await.map_err(OrderFlowError::database)?;
                info!("🔄️ Order {order_id} accepted and allocated");
                let report = outcome.report.clone();
                publish_allocation_events(&self.producers, outcome).await;
                Ok(report)
            },
            Err(e) => {
                if let Err(rb) = session.rollback().await {
                    error!("🔄️ Could not roll back the allocation of order {order_id}: {rb}");
                }
                warn!("🔄️ Order {order_id} could not be allocated: {e}. Flagging it for manual attention.");
                let mut session = self.db.begin().await.map_err(OrderFlowError::database)?;
                let note = NewOrderStatusUpdate::new(order.status, Actor::system()).with_note(format!("allocation failed: {e}"));
                session.append_order_note(order_id, note).await.map_err(OrderFlowError::database)?;
                session.commit().await.map_err(OrderFlowError::database)?;
                self.producers.publish_allocation_failed(AllocationFailedEvent::new(order_id, e.to_string())).await;
                Err(OrderFlowError::Allocation(e))
            },
        }
    }
}
