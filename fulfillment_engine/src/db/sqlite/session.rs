use log::{trace, warn};
use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection, SqlitePool};
use storefront_common::Quantity;

use crate::{
    db::{
        sqlite::{inventory, mutations, orders, stores, SqliteDatabaseError},
        traits::{
            DatabaseSession,
            InsertMutationResult,
            InventoryManagement,
            MutationManagement,
            OrderManagement,
            StoreDirectory,
        },
    },
    db_types::{
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

/// A `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// sqlx only opens deferred transactions on SQLite, which fail with `SQLITE_BUSY` when two readers both try to
/// upgrade to a write. Taking the write lock up front means a concurrent session waits on the busy timeout instead.
///
/// If the session is dropped while still open, the connection is detached from the pool and closed, which makes
/// SQLite discard the transaction.
pub struct SqliteSession {
    conn: Option<PoolConnection<Sqlite>>,
}

impl SqliteSession {
    pub(crate) async fn begin(pool: &SqlitePool) -> Result<Self, SqliteDatabaseError> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        trace!("🗃️ Session started");
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection, SqliteDatabaseError> {
        self.conn.as_deref_mut().ok_or(SqliteDatabaseError::SessionClosed)
    }

    async fn finish(mut self, statement: &'static str) -> Result<(), SqliteDatabaseError> {
        let mut conn = self.conn.take().ok_or(SqliteDatabaseError::SessionClosed)?;
        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            warn!("🗃️ {statement} failed: {e}. The connection will be discarded.");
            drop(conn.detach());
            return Err(e.into());
        }
        trace!("🗃️ Session closed with {statement}");
        Ok(())
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            trace!("🗃️ Session dropped without commit. Discarding its changes.");
            drop(conn.detach());
        }
    }
}

impl DatabaseSession for SqliteSession {
    type Error = SqliteDatabaseError;

    async fn commit(self) -> Result<(), Self::Error> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        self.finish("ROLLBACK").await
    }
}

impl InventoryManagement for SqliteSession {
    type Error = SqliteDatabaseError;

    async fn fetch_stock(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, Self::Error> {
        inventory::fetch_stock(store_id, product_id, self.conn()?).await
    }

    async fn apply_stock_delta(&mut self, adjustment: &StockAdjustment) -> Result<StockUpdateResult, Self::Error> {
        inventory::apply_stock_delta(adjustment, self.conn()?).await
    }

    async fn fetch_stock_journal_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<StockJournalEntry>, Self::Error> {
        inventory::fetch_stock_journal_for_order(order_id, self.conn()?).await
    }
}

impl StoreDirectory for SqliteSession {
    type Error = SqliteDatabaseError;

    async fn insert_store(&mut self, store: NewStore) -> Result<Store, Self::Error> {
        stores::insert_store(store, self.conn()?).await
    }

    async fn fetch_store(&mut self, store_id: StoreId) -> Result<Option<Store>, Self::Error> {
        stores::fetch_store(store_id, self.conn()?).await
    }

    async fn fetch_stores(&mut self) -> Result<Vec<Store>, Self::Error> {
        stores::fetch_stores(self.conn()?).await
    }

    async fn fetch_stores_stocking(
        &mut self,
        product_id: ProductId,
        min_stock: Quantity,
    ) -> Result<Vec<StoreStock>, Self::Error> {
        stores::fetch_stores_stocking(product_id, min_stock, self.conn()?).await
    }
}

impl MutationManagement for SqliteSession {
    type Error = SqliteDatabaseError;

    async fn insert_mutation(&mut self, mutation: NewMutation) -> Result<InsertMutationResult, Self::Error> {
        mutations::insert_mutation(mutation, self.conn()?).await
    }

    async fn fetch_mutation(&mut self, id: MutationId) -> Result<Option<Mutation>, Self::Error> {
        mutations::fetch_mutation(id, self.conn()?).await
    }

    async fn fetch_status_updates(&mut self, id: MutationId) -> Result<Vec<MutationStatusUpdate>, Self::Error> {
        mutations::fetch_status_updates(id, self.conn()?).await
    }

    async fn transition_mutation(
        &mut self,
        id: MutationId,
        expected: MutationStatus,
        update: NewMutationStatusUpdate,
    ) -> Result<Option<Mutation>, Self::Error> {
        mutations::transition_mutation(id, expected, update, self.conn()?).await
    }

    async fn fetch_mutations(&mut self, filter: MutationQueryFilter) -> Result<Vec<Mutation>, Self::Error> {
        mutations::fetch_mutations(filter, self.conn()?).await
    }
}

impl OrderManagement for SqliteSession {
    type Error = SqliteDatabaseError;

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, Self::Error> {
        orders::insert_order(order, self.conn()?).await
    }

    async fn fetch_order(&mut self, order_id: OrderId) -> Result<Option<Order>, Self::Error> {
        orders::fetch_order(order_id, self.conn()?).await
    }

    async fn fetch_orders(&mut self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        orders::fetch_orders(filter, self.conn()?).await
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatusType,
        update: NewOrderStatusUpdate,
    ) -> Result<Option<Order>, Self::Error> {
        orders::update_order_status(order_id, expected, update, self.conn()?).await
    }

    async fn append_order_note(&mut self, order_id: OrderId, update: NewOrderStatusUpdate) -> Result<(), Self::Error> {
        orders::append_order_note(order_id, update, self.conn()?).await
    }

    async fn fetch_order_status_history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusUpdate>, Self::Error> {
        orders::fetch_order_status_history(order_id, self.conn()?).await
    }

    async fn mark_order_allocated(&mut self, order_id: OrderId) -> Result<bool, Self::Error> {
        orders::mark_order_allocated(order_id, self.conn()?).await
    }

    async fn upsert_payment_proof(
        &mut self,
        order_id: OrderId,
        image_ref: &str,
        uploaded_by: UserId,
    ) -> Result<PaymentProof, Self::Error> {
        orders::upsert_payment_proof(order_id, image_ref, uploaded_by, self.conn()?).await
    }

    async fn fetch_payment_proof(&mut self, order_id: OrderId) -> Result<Option<PaymentProof>, Self::Error> {
        orders::fetch_payment_proof(order_id, self.conn()?).await
    }

    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        status: PaymentStatus,
        reviewed_by: UserId,
    ) -> Result<Option<PaymentProof>, Self::Error> {
        orders::update_payment_status(order_id, status, reviewed_by, self.conn()?).await
    }
}
