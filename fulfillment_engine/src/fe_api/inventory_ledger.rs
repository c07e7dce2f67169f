//! The inventory ledger: per (store, product) stock counters with an audit journal.
//!
//! The free functions operate on an open session and are what the allocator composes into a single unit of work.
//! [`InventoryLedger`] wraps each of them in a session of its own.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use storefront_common::Quantity;

use crate::{
    db::traits::{DatabaseSession, FulfillmentDatabase, InventoryManagement, StoreDirectory},
    db_types::{
        Actor,
        InventoryRecord,
        OrderId,
        ProductId,
        StockAdjustment,
        StockAvailability,
        StockJournalEntry,
        StockUpdateResult,
        StoreId,
    },
    fe_api::errors::FulfillmentError,
};

/// Reports the current stock of the product at the store. A store that has never stocked the product reports zero.
///
/// `requested` is carried along so that the caller can compute the shortfall; the reported stock is never clamped.
pub async fn check_availability<S: InventoryManagement>(
    session: &mut S,
    store_id: StoreId,
    product_id: ProductId,
    requested: Quantity,
) -> Result<StockAvailability, FulfillmentError> {
    let record = session.fetch_stock(store_id, product_id).await.map_err(FulfillmentError::database)?;
    let available_stock = record.map(|r| r.stock).unwrap_or_default();
    trace!("📦️ Store {store_id} holds {available_stock} of product {product_id} ({requested} requested)");
    Ok(StockAvailability { store_id, product_id, requested, available_stock })
}

/// Applies the adjustment atomically. Deductions that would leave the stock negative fail with
/// [`FulfillmentError::InsufficientStock`] and change nothing. Restocks that would push the stock past
/// `i64::MAX` fail with [`FulfillmentError::InvalidQuantity`] and also change nothing.
pub async fn adjust_stock<S: InventoryManagement>(
    session: &mut S,
    adjustment: &StockAdjustment,
) -> Result<InventoryRecord, FulfillmentError> {
    if adjustment.delta.is_zero() {
        return Err(FulfillmentError::InvalidQuantity("a stock adjustment cannot be zero".into()));
    }
    let Some(requested) = adjustment.delta.checked_neg() else {
        return Err(FulfillmentError::InvalidQuantity(format!("{} is out of range", adjustment.delta)));
    };
    if adjustment.delta.is_positive() {
        let current = session
            .fetch_stock(adjustment.store_id, adjustment.product_id)
            .await
            .map_err(FulfillmentError::database)?
            .map(|r| r.stock)
            .unwrap_or_default();
        if current.checked_add(adjustment.delta).is_none() {
            return Err(overflow(adjustment, current));
        }
    }
    let result = session.apply_stock_delta(adjustment).await.map_err(FulfillmentError::database)?;
    let insufficient = |available: Quantity| FulfillmentError::InsufficientStock {
        store_id: adjustment.store_id,
        product_id: adjustment.product_id,
        available,
        requested,
    };
    match result {
        StockUpdateResult::Applied(record) => {
            debug!(
                "📦️ Stock of product {} at store {} adjusted by {} to {} by {}",
                record.product_id, record.store_id, adjustment.delta, record.stock, adjustment.actor
            );
            Ok(record)
        },
        StockUpdateResult::Insufficient { available } => Err(insufficient(available)),
        StockUpdateResult::NoRecord => Err(insufficient(Quantity::ZERO)),
        StockUpdateResult::Overflow { current } => Err(overflow(adjustment, current)),
    }
}

fn overflow(adjustment: &StockAdjustment, current: Quantity) -> FulfillmentError {
    warn!(
        "📦️ Refusing to add {} to the {current} units of product {} at store {}",
        adjustment.delta, adjustment.product_id, adjustment.store_id
    );
    FulfillmentError::InvalidQuantity(format!(
        "adding {} to the stock of {current} units of product {} at store {} overflows",
        adjustment.delta, adjustment.product_id, adjustment.store_id
    ))
}

/// `InventoryLedger` reads and adjusts stock levels, each call in its own unit of work.
pub struct InventoryLedger<B> {
    db: B,
}

impl<B> Debug for InventoryLedger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryLedger")
    }
}

impl<B> InventoryLedger<B>
where B: FulfillmentDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Read-only. Two calls with no write in between report the same stock.
    pub async fn check_availability(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        requested: Quantity,
    ) -> Result<StockAvailability, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let availability = check_availability(&mut session, store_id, product_id, requested).await?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(availability)
    }

    /// Applies `adjustment` to the store's stock. Restocking a product the store has never held creates its
    /// inventory record.
    pub async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<InventoryRecord, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        ensure_store_exists(&mut session, adjustment.store_id).await?;
        let record = adjust_stock(&mut session, &adjustment).await?;
        session.commit().await.map_err(FulfillmentError::database)?;
        Ok(record)
    }

    /// Sets the stock to an absolute level, e.g. after a stock take. The change is journaled as the difference from
    /// the current level.
    pub async fn set_stock(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        stock: Quantity,
        actor: Actor,
    ) -> Result<InventoryRecord, FulfillmentError> {
        if stock.is_negative() {
            return Err(FulfillmentError::InvalidQuantity(format!("stock cannot be negative. Got {stock}")));
        }
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        ensure_store_exists(&mut session, store_id).await?;
        let current = session.fetch_stock(store_id, product_id).await.map_err(FulfillmentError::database)?;
        let delta = stock - current.as_ref().map(|r| r.stock).unwrap_or_default();
        let record = if delta.is_zero() {
            trace!("📦️ Stock of product {product_id} at store {store_id} is already {stock}");
            current.unwrap_or(InventoryRecord { store_id, product_id, stock, updated_at: Utc::now() })
        } else {
            let adjustment =
                StockAdjustment::new(store_id, product_id, delta, actor).with_reason(format!("stock set to {stock}"));
            adjust_stock(&mut session, &adjustment).await?
        };
        session.commit().await.map_err(FulfillmentError::database)?;
        info!("📦️ Stock of product {product_id} at store {store_id} set to {stock} by {actor}");
        Ok(record)
    }

    /// Every stock change attributed to the order, oldest first.
    pub async fn stock_journal_for_order(&self, order_id: OrderId) -> Result<Vec<StockJournalEntry>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let journal = session.fetch_stock_journal_for_order(order_id).await.map_err(FulfillmentError::database)?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(journal)
    }
}

pub(crate) async fn ensure_store_exists<S: StoreDirectory>(
    session: &mut S,
    store_id: StoreId,
) -> Result<(), FulfillmentError> {
    match session.fetch_store(store_id).await.map_err(FulfillmentError::database)? {
        Some(_) => Ok(()),
        None => Err(FulfillmentError::StoreNotFound(store_id)),
    }
}

#[cfg(test)]
mod test {
    use storefront_common::GeoPoint;

    use super::*;
    use crate::{
        db::memory::MemoryDatabase,
        db_types::{NewStore, UserId},
    };

    async fn ledger_with_store(stock: i64) -> (InventoryLedger<MemoryDatabase>, StoreId) {
        let db = MemoryDatabase::new();
        let mut session = db.begin().await.unwrap();
        let store = session.insert_store(NewStore::new("Bandung", GeoPoint::new(-6.91, 107.61).unwrap())).await.unwrap();
        session.commit().await.unwrap();
        let ledger = InventoryLedger::new(db);
        if stock > 0 {
            ledger.set_stock(store.id, ProductId(42), Quantity::from(stock), Actor::admin(UserId(1))).await.unwrap();
        }
        (ledger, store.id)
    }

    #[tokio::test]
    async fn availability_reports_true_stock() {
        let (ledger, store_id) = ledger_with_store(3).await;
        let first = ledger.check_availability(store_id, ProductId(42), Quantity::from(5)).await.unwrap();
        let second = ledger.check_availability(store_id, ProductId(42), Quantity::from(5)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.available_stock, Quantity::from(3));
        assert_eq!(first.shortfall(), Quantity::from(2));
        let unknown = ledger.check_availability(store_id, ProductId(7), Quantity::from(1)).await.unwrap();
        assert!(unknown.available_stock.is_zero());
    }

    #[tokio::test]
    async fn deductions_cannot_overdraw() {
        let (ledger, store_id) = ledger_with_store(3).await;
        let customer = Actor::customer(UserId(9));
        let over = StockAdjustment::new(store_id, ProductId(42), Quantity::from(-4), customer).for_order(OrderId(1));
        let err = ledger.adjust_stock(over).await.unwrap_err();
        assert_eq!(err, FulfillmentError::InsufficientStock {
            store_id,
            product_id: ProductId(42),
            available: Quantity::from(3),
            requested: Quantity::from(4),
        });
        let ok = StockAdjustment::new(store_id, ProductId(42), Quantity::from(-3), customer).for_order(OrderId(1));
        let record = ledger.adjust_stock(ok).await.unwrap();
        assert!(record.stock.is_zero());
        let journal = ledger.stock_journal_for_order(OrderId(1)).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].delta, Quantity::from(-3));
        assert_eq!(journal[0].actor, customer);
    }

    #[tokio::test]
    async fn zero_and_unknown_store_adjustments_fail() {
        let (ledger, store_id) = ledger_with_store(1).await;
        let zero = StockAdjustment::new(store_id, ProductId(42), Quantity::ZERO, Actor::system());
        assert!(matches!(ledger.adjust_stock(zero).await, Err(FulfillmentError::InvalidQuantity(_))));
        let nowhere = StockAdjustment::new(StoreId(999), ProductId(42), Quantity::from(1), Actor::system());
        assert_eq!(ledger.adjust_stock(nowhere).await.unwrap_err(), FulfillmentError::StoreNotFound(StoreId(999)));
    }

    #[tokio::test]
    async fn restocks_cannot_overflow() {
        let (ledger, store_id) = ledger_with_store(0).await;
        let one = StockAdjustment::new(store_id, ProductId(42), Quantity::from(1), Actor::system());
        ledger.adjust_stock(one).await.unwrap();
        let huge = StockAdjustment::new(store_id, ProductId(42), Quantity::from(i64::MAX), Actor::system());
        assert!(matches!(ledger.adjust_stock(huge).await, Err(FulfillmentError::InvalidQuantity(_))));
        let unnegatable = StockAdjustment::new(store_id, ProductId(42), Quantity::from(i64::MIN), Actor::system());
        assert!(matches!(ledger.adjust_stock(unnegatable).await, Err(FulfillmentError::InvalidQuantity(_))));
        let availability = ledger.check_availability(store_id, ProductId(42), Quantity::from(1)).await.unwrap();
        assert_eq!(availability.available_stock, Quantity::from(1));
    }

    #[tokio::test]
    async fn set_stock_journals_the_difference() {
        let (ledger, store_id) = ledger_with_store(10).await;
        let admin = Actor::admin(UserId(1));
        let record = ledger.set_stock(store_id, ProductId(42), Quantity::from(4), admin).await.unwrap();
        assert_eq!(record.stock, Quantity::from(4));
        let same = ledger.set_stock(store_id, ProductId(42), Quantity::from(4), admin).await.unwrap();
        assert_eq!(same.stock, Quantity::from(4));
        let negative = ledger.set_stock(store_id, ProductId(42), Quantity::from(-1), admin).await;
        assert!(matches!(negative, Err(FulfillmentError::InvalidQuantity(_))));
    }
}
