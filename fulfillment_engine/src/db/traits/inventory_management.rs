use crate::db_types::{InventoryRecord, OrderId, ProductId, StockAdjustment, StockJournalEntry, StockUpdateResult, StoreId};

/// Per-(store, product) stock counters and their audit journal.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    type Error: std::error::Error;

    /// Fetches the inventory record for the given store and product. If the store has never stocked the product,
    /// `None` is returned.
    async fn fetch_stock(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, Self::Error>;

    /// Applies `adjustment.delta` to the inventory record, in a single atomic step:
    /// * If the result would be negative, nothing changes and [`StockUpdateResult::Insufficient`] is returned.
    /// * If there is no record and the delta is a deduction, [`StockUpdateResult::NoRecord`] is returned.
    /// * If the result would overflow, nothing changes and [`StockUpdateResult::Overflow`] is returned.
    /// * If there is no record and the delta is positive, the record is created.
    /// * Otherwise the stock is updated and a [`StockJournalEntry`] is written in the same unit of work.
    async fn apply_stock_delta(&mut self, adjustment: &StockAdjustment) -> Result<StockUpdateResult, Self::Error>;

    /// Every journal entry attributed to the order, oldest first.
    async fn fetch_stock_journal_for_order(&mut self, order_id: OrderId)
        -> Result<Vec<StockJournalEntry>, Self::Error>;
}
