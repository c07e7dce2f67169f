use crate::db_types::{
    NewOrder,
    NewOrderStatusUpdate,
    Order,
    OrderId,
    OrderQueryFilter,
    OrderStatusType,
    OrderStatusUpdate,
    PaymentProof,
    PaymentStatus,
    UserId,
};

/// The `OrderManagement` trait defines the behaviour for reading orders and recording their status changes.
///
/// Orders are created at checkout, outside of the engine; `insert_order` exists for that collaborator and for tests.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, Self::Error>;

    /// Fetches the order and its line items.
    async fn fetch_order(&mut self, order_id: OrderId) -> Result<Option<Order>, Self::Error>;

    /// Fetches orders according to the filter, newest first.
    async fn fetch_orders(&mut self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error>;

    /// Compare-and-set on the order status. If the order is in `expected` state, the status is changed and an
    /// [`OrderStatusUpdate`] appended. Otherwise nothing is written and `None` is returned.
    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatusType,
        update: NewOrderStatusUpdate,
    ) -> Result<Option<Order>, Self::Error>;

    /// Appends an audit entry without changing the order status (e.g. to flag a failed allocation).
    async fn append_order_note(&mut self, order_id: OrderId, update: NewOrderStatusUpdate) -> Result<(), Self::Error>;

    /// The status history of the order, oldest first.
    async fn fetch_order_status_history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusUpdate>, Self::Error>;

    /// Marks the order as allocated. Returns `false` if it had already been allocated, in which case nothing changes.
    async fn mark_order_allocated(&mut self, order_id: OrderId) -> Result<bool, Self::Error>;

    /// Stores the payment proof for the order, replacing any previous (rejected) proof. The status is reset to
    /// `Pending`.
    async fn upsert_payment_proof(
        &mut self,
        order_id: OrderId,
        image_ref: &str,
        uploaded_by: UserId,
    ) -> Result<PaymentProof, Self::Error>;

    async fn fetch_payment_proof(&mut self, order_id: OrderId) -> Result<Option<PaymentProof>, Self::Error>;

    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        status: PaymentStatus,
        reviewed_by: UserId,
    ) -> Result<Option<PaymentProof>, Self::Error>;
}
