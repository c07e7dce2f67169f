use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use storefront_common::{GeoPoint, Quantity};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }
    };
}

//--------------------------------------        Ids           ---------------------------------------------------------
id_type!(StoreId, "The database id of a physical store");
id_type!(ProductId, "The database id of a catalogue product");
id_type!(OrderId, "The database id of a customer order");
id_type!(UserId, "The id of a customer or admin user");
id_type!(MutationId, "The id of an inter-store stock transfer request");

//--------------------------------------       Actor          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    Customer,
    Admin,
    /// Automated processes. The actor id is always 0.
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Customer => write!(f, "Customer"),
            ActorRole::Admin => write!(f, "Admin"),
            ActorRole::System => write!(f, "System"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Customer" => Ok(Self::Customer),
            "Admin" => Ok(Self::Admin),
            "System" => Ok(Self::System),
            s => Err(ConversionError(format!("Invalid actor role: {s}"))),
        }
    }
}

/// The user that a ledger adjustment or status change is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer<U: Into<UserId>>(id: U) -> Self {
        Self { id: id.into(), role: ActorRole::Customer }
    }

    pub fn admin<U: Into<UserId>>(id: U) -> Self {
        Self { id: id.into(), role: ActorRole::Admin }
    }

    pub fn system() -> Self {
        Self { id: UserId(0), role: ActorRole::System }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}

//--------------------------------------       Store          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub location: GeoPoint,
}

impl NewStore {
    pub fn new<S: Into<String>>(name: S, location: GeoPoint) -> Self {
        Self { name: name.into(), location }
    }
}

/// A store together with its current stock of a single product.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStock {
    pub store: Store,
    pub product_id: ProductId,
    pub stock: Quantity,
}

//--------------------------------------     Inventory        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub stock: Quantity,
    pub updated_at: DateTime<Utc>,
}

/// The answer to "how much of `product_id` does `store_id` hold?", in the context of a request for `requested` units.
///
/// `available_stock` is the true stock level. It is never clamped to `requested`, so that callers can compute the
/// shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAvailability {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub requested: Quantity,
    pub available_stock: Quantity,
}

impl StockAvailability {
    pub fn covers(&self) -> bool {
        self.available_stock >= self.requested
    }

    /// The number of units that the store cannot supply. Zero if the store covers the request.
    pub fn shortfall(&self) -> Quantity {
        if self.covers() {
            Quantity::ZERO
        } else {
            self.requested - self.available_stock
        }
    }

    /// The number of units that can be taken from this store: `min(available, requested)`.
    pub fn deductible(&self) -> Quantity {
        self.available_stock.min(self.requested).max(Quantity::ZERO)
    }
}

/// A request to change a stock level by `delta` units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub delta: Quantity,
    pub order_id: Option<OrderId>,
    pub actor: Actor,
    pub reason: Option<String>,
}

impl StockAdjustment {
    pub fn new(store_id: StoreId, product_id: ProductId, delta: Quantity, actor: Actor) -> Self {
        Self { store_id, product_id, delta, order_id: None, actor, reason: None }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// An append-only audit row, written in the same unit of work as the stock change it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockJournalEntry {
    pub id: i64,
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub delta: Quantity,
    pub resulting_stock: Quantity,
    pub order_id: Option<OrderId>,
    pub actor: Actor,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The outcome of an atomic, conditional stock update in a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockUpdateResult {
    /// The delta was applied. Contains the record after the update.
    Applied(InventoryRecord),
    /// Applying the delta would have driven stock negative. Nothing was changed.
    Insufficient { available: Quantity },
    /// There is no inventory record for the (store, product) pair and the delta was a deduction.
    NoRecord,
    /// The resulting stock would not fit in a [`Quantity`]. Nothing was changed.
    Overflow { current: Quantity },
}

//--------------------------------------   MutationStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationStatus {
    /// A transfer has been requested and awaits a decision by the sending store.
    Requested,
    /// The transfer was approved and is awaiting physical completion.
    Approved,
    /// The transfer was declined.
    Rejected,
    /// The goods have arrived at the receiving store.
    Completed,
}

impl MutationStatus {
    /// Whether `next` is reachable from `self` in a single step.
    ///
    /// ```text
    /// REQUESTED -> APPROVED -> COMPLETED
    ///           -> REJECTED
    /// ```
    pub fn can_transition_to(&self, next: MutationStatus) -> bool {
        use MutationStatus::*;
        matches!((self, next), (Requested, Approved) | (Requested, Rejected) | (Approved, Completed))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationStatus::Rejected | MutationStatus::Completed)
    }
}

impl Display for MutationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationStatus::Requested => write!(f, "REQUESTED"),
            MutationStatus::Approved => write!(f, "APPROVED"),
            MutationStatus::Rejected => write!(f, "REJECTED"),
            MutationStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl FromStr for MutationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(Self::Requested),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "COMPLETED" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid mutation status: {s}"))),
        }
    }
}

//--------------------------------------      Mutation        ---------------------------------------------------------
/// An inter-store stock transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub id: MutationId,
    pub from_store_id: StoreId,
    pub to_store_id: StoreId,
    pub status: MutationStatus,
    pub product_id: Option<ProductId>,
    pub quantity: Option<Quantity>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMutation {
    pub from_store_id: StoreId,
    pub to_store_id: StoreId,
    /// The user requesting the transfer. Becomes the creator of the initiating status update.
    pub requested_by: Actor,
    pub description: String,
    pub product_id: Option<ProductId>,
    pub quantity: Option<Quantity>,
    pub order_id: Option<OrderId>,
}

impl NewMutation {
    pub fn new<S: Into<String>>(from_store_id: StoreId, to_store_id: StoreId, requested_by: Actor, description: S) -> Self {
        Self {
            from_store_id,
            to_store_id,
            requested_by,
            description: description.into(),
            product_id: None,
            quantity: None,
            order_id: None,
        }
    }

    /// Links the transfer to the order line that caused it.
    pub fn for_order(mut self, order_id: OrderId, product_id: ProductId, quantity: Quantity) -> Self {
        self.order_id = Some(order_id);
        self.product_id = Some(product_id);
        self.quantity = Some(quantity);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStatusUpdate {
    pub id: i64,
    pub mutation_id: MutationId,
    pub creator_id: UserId,
    pub status: MutationStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMutationStatusUpdate {
    pub status: MutationStatus,
    pub actor: Actor,
    pub description: String,
}

impl NewMutationStatusUpdate {
    pub fn new<S: Into<String>>(status: MutationStatus, actor: Actor, description: S) -> Self {
        Self { status, actor, description: description.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationDirection {
    /// Transfers into the filtered store.
    Incoming,
    /// Transfers out of the filtered store.
    Outgoing,
    #[default]
    Either,
}

#[derive(Debug, Clone, Default)]
pub struct MutationQueryFilter {
    pub store_id: Option<StoreId>,
    pub direction: MutationDirection,
    pub statuses: Vec<MutationStatus>,
    pub order_id: Option<OrderId>,
}

impl MutationQueryFilter {
    pub fn involving_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self.direction = MutationDirection::Either;
        self
    }

    pub fn incoming_to(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self.direction = MutationDirection::Incoming;
        self
    }

    pub fn outgoing_from(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self.direction = MutationDirection::Outgoing;
        self
    }

    pub fn with_status(mut self, status: MutationStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() && self.statuses.is_empty() && self.order_id.is_none()
    }

    pub fn matches(&self, mutation: &Mutation) -> bool {
        let store_ok = match (self.store_id, self.direction) {
            (None, _) => true,
            (Some(id), MutationDirection::Incoming) => mutation.to_store_id == id,
            (Some(id), MutationDirection::Outgoing) => mutation.from_store_id == id,
            (Some(id), MutationDirection::Either) => mutation.to_store_id == id || mutation.from_store_id == id,
        };
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&mutation.status);
        let order_ok = self.order_id.map_or(true, |oid| mutation.order_id == Some(oid));
        store_ok && status_ok && order_ok
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed and no payment proof has been uploaded yet.
    AwaitingPayment,
    /// A payment proof has been uploaded and awaits review by an admin.
    AwaitingConfirmation,
    /// Payment was approved. The order is being prepared.
    Processing,
    /// The order has left the store.
    Shipped,
    /// The customer has received the order.
    Confirmed,
    /// The order was cancelled by the customer or an admin.
    Cancelled,
}

impl OrderStatusType {
    /// Finished orders no longer change.
    pub fn is_finished(&self) -> bool {
        matches!(self, OrderStatusType::Confirmed | OrderStatusType::Cancelled)
    }

    pub fn unfinished() -> [OrderStatusType; 4] {
        use OrderStatusType::*;
        [AwaitingPayment, AwaitingConfirmation, Processing, Shipped]
    }

    pub fn finished() -> [OrderStatusType; 2] {
        [OrderStatusType::Confirmed, OrderStatusType::Cancelled]
    }

    /// Whether an order may move from `self` to `next`.
    ///
    /// A rejected payment sends the order from `AwaitingConfirmation` back to `AwaitingPayment`. Cancellation is
    /// possible until the order has shipped.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (AwaitingPayment, AwaitingConfirmation) |
                (AwaitingPayment, Cancelled) |
                (AwaitingConfirmation, Processing) |
                (AwaitingConfirmation, AwaitingPayment) |
                (AwaitingConfirmation, Cancelled) |
                (Processing, Shipped) |
                (Processing, Cancelled) |
                (Shipped, Confirmed)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::AwaitingPayment => write!(f, "AwaitingPayment"),
            OrderStatusType::AwaitingConfirmation => write!(f, "AwaitingConfirmation"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AwaitingPayment" => Ok(Self::AwaitingPayment),
            "AwaitingConfirmation" => Ok(Self::AwaitingConfirmation),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    /// The quantity the customer put in the cart.
    pub quantity: Quantity,
    /// The quantity to ship, after any promotional free items have been added upstream.
    pub final_quantity: Quantity,
}

impl OrderLineItem {
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self { product_id, quantity, final_quantity: quantity }
    }

    pub fn with_final_quantity(mut self, final_quantity: Quantity) -> Self {
        self.final_quantity = final_quantity;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    /// The store pre-assigned as primary fulfillment source
    pub nearest_store_id: StoreId,
    pub delivery: GeoPoint,
    pub status: OrderStatusType,
    pub line_items: Vec<OrderLineItem>,
    /// Set once stock has been allocated to the order. Allocation only ever happens once.
    pub allocated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub nearest_store_id: StoreId,
    pub delivery: GeoPoint,
    pub line_items: Vec<OrderLineItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(customer_id: UserId, nearest_store_id: StoreId, delivery: GeoPoint) -> Self {
        Self { customer_id, nearest_store_id, delivery, line_items: Vec::new(), created_at: Utc::now() }
    }

    pub fn with_item(mut self, item: OrderLineItem) -> Self {
        self.line_items.push(item);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub actor: Actor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderStatusUpdate {
    pub status: OrderStatusType,
    pub actor: Actor,
    pub note: Option<String>,
}

impl NewOrderStatusUpdate {
    pub fn new(status: OrderStatusType, actor: Actor) -> Self {
        Self { status, actor, note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub customer_id: Option<UserId>,
    pub statuses: Vec<OrderStatusType>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_customer_id(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_after = Some(from);
        self.created_before = Some(to);
        self
    }

    /// Confirmed and cancelled orders for the customer.
    pub fn finished(customer_id: UserId) -> Self {
        OrderStatusType::finished().into_iter().fold(Self::default().with_customer_id(customer_id), Self::with_status)
    }

    /// Orders for the customer that are still in flight.
    pub fn unfinished(customer_id: UserId) -> Self {
        OrderStatusType::unfinished()
            .into_iter()
            .fold(Self::default().with_customer_id(customer_id), Self::with_status)
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() &&
            self.statuses.is_empty() &&
            self.created_after.is_none() &&
            self.created_before.is_none()
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.map_or(true, |c| order.customer_id == c) &&
            (self.statuses.is_empty() || self.statuses.contains(&order.status)) &&
            self.created_after.map_or(true, |t| order.created_at >= t) &&
            self.created_before.map_or(true, |t| order.created_at <= t)
    }
}

//--------------------------------------      Payments        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Approved => write!(f, "Approved"),
            PaymentStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

/// A proof of payment (e.g. a bank transfer receipt) uploaded by the customer. File storage is external; only the
/// reference to the stored image is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub order_id: OrderId,
    pub image_ref: String,
    pub status: PaymentStatus,
    pub uploaded_by: UserId,
    pub reviewed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finished_orders_never_move() {
        use OrderStatusType::*;
        let all = [AwaitingPayment, AwaitingConfirmation, Processing, Shipped, Confirmed, Cancelled];
        for from in OrderStatusType::finished() {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
        assert!(AwaitingConfirmation.can_transition_to(AwaitingPayment));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!AwaitingPayment.can_transition_to(Processing));
    }

    #[test]
    fn mutation_transitions() {
        use MutationStatus::*;
        let all = [Requested, Approved, Rejected, Completed];
        let allowed: Vec<(MutationStatus, MutationStatus)> = all
            .iter()
            .flat_map(|from| all.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();
        assert_eq!(allowed, vec![(Requested, Approved), (Requested, Rejected), (Approved, Completed)]);
        assert!(Completed.is_terminal() && Rejected.is_terminal());
        assert!(!Approved.is_terminal());
        for s in all {
            assert_eq!(s.to_string().parse::<MutationStatus>().unwrap(), s);
        }
    }

    #[test]
    fn availability_arithmetic() {
        let partial = StockAvailability {
            store_id: StoreId(1),
            product_id: ProductId(42),
            requested: Quantity::from(5),
            available_stock: Quantity::from(3),
        };
        assert!(!partial.covers());
        assert_eq!(partial.shortfall(), Quantity::from(2));
        assert_eq!(partial.deductible(), Quantity::from(3));
        let plenty = StockAvailability { available_stock: Quantity::from(30), ..partial };
        assert!(plenty.covers());
        assert_eq!(plenty.shortfall(), Quantity::ZERO);
        assert_eq!(plenty.deductible(), Quantity::from(5));
    }

    #[test]
    fn order_filters() {
        let f = OrderQueryFilter::finished(UserId(7));
        assert_eq!(f.customer_id, Some(UserId(7)));
        assert_eq!(f.statuses, vec![OrderStatusType::Confirmed, OrderStatusType::Cancelled]);
        assert_eq!(OrderQueryFilter::unfinished(UserId(7)).statuses.len(), 4);
        assert!(OrderQueryFilter::default().is_empty());
    }

    #[test]
    fn mutation_filters() {
        let now = Utc::now();
        let m = Mutation {
            id: MutationId(1),
            from_store_id: StoreId(2),
            to_store_id: StoreId(1),
            status: MutationStatus::Requested,
            product_id: Some(ProductId(42)),
            quantity: Some(Quantity::from(2)),
            order_id: Some(OrderId(9)),
            created_at: now,
            updated_at: now,
        };
        assert!(MutationQueryFilter::default().matches(&m));
        assert!(MutationQueryFilter::default().incoming_to(StoreId(1)).matches(&m));
        assert!(!MutationQueryFilter::default().outgoing_from(StoreId(1)).matches(&m));
        assert!(MutationQueryFilter::default().involving_store(StoreId(2)).matches(&m));
        assert!(!MutationQueryFilter::default().with_status(MutationStatus::Approved).matches(&m));
        assert!(MutationQueryFilter::default().with_order_id(OrderId(9)).matches(&m));
    }
}
