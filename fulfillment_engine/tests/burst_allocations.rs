//! Many orders competing for the same stock at the same time.
use fulfillment_engine::{
    db_types::{Actor, NewStore, OrderId, OrderLineItem, ProductId, StockAdjustment, UserId},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DatabaseSession,
    FulfillmentAllocator,
    FulfillmentDatabase,
    FulfillmentError,
    InventoryLedger,
    InventoryManagement,
    StoreDirectory,
};
use futures_util::future::join_all;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storefront_common::{GeoPoint, Quantity};
use tokio::runtime::Runtime;

const NUM_ORDERS: i64 = 25;
const STOCK: i64 = 10;
const PRODUCT: ProductId = ProductId(77);

#[test]
fn burst_allocations() {
    info!("🚀️ Starting allocation burst test");
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let url = random_db_path();
        let mut db = prepare_test_env(&url).await;
        let location = GeoPoint::new(-6.2, 106.8).unwrap();
        let store = {
            let mut session = db.begin().await.unwrap();
            let store = session.insert_store(NewStore::new("Only store", location)).await.unwrap();
            let adj = StockAdjustment::new(store.id, PRODUCT, Quantity::from(STOCK), Actor::system());
            session.apply_stock_delta(&adj).await.unwrap();
            session.commit().await.unwrap();
            store
        };

        let store_id = store.id;
        let allocator = FulfillmentAllocator::new(db.clone(), EventProducers::default());
        info!("🚀️ Allocating {NUM_ORDERS} orders against {STOCK} units");
        let jobs = (0..NUM_ORDERS).map(|i| {
            let allocator = &allocator;
            async move {
                let items = [OrderLineItem::new(PRODUCT, Quantity::from(1))];
                allocator.allocate_stock_for_order(&items, location, store_id, OrderId(i + 1), UserId(i % 5)).await
            }
        });
        let results = join_all(jobs).await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(FulfillmentError::InsufficientStoreCapacity { .. })))
            .count();
        assert_eq!(succeeded as i64, STOCK);
        assert_eq!(short as i64, NUM_ORDERS - STOCK);

        let ledger = InventoryLedger::new(db.clone());
        let remaining = ledger.check_availability(store.id, PRODUCT, Quantity::from(1)).await.unwrap();
        assert_eq!(remaining.available_stock, Quantity::ZERO);

        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        Sqlite::drop_database(&url).await.unwrap();
    });
    info!("🚀️ test complete");
}

#[test]
fn burst_deductions_never_overdraw() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let url = random_db_path();
        let mut db = prepare_test_env(&url).await;
        let store = {
            let mut session = db.begin().await.unwrap();
            let store = session
                .insert_store(NewStore::new("Warehouse", GeoPoint::new(-7.25, 112.75).unwrap()))
                .await
                .unwrap();
            session.commit().await.unwrap();
            store
        };
        let ledger = InventoryLedger::new(db.clone());
        let store_id = store.id;
        ledger.set_stock(store_id, PRODUCT, Quantity::from(STOCK), Actor::admin(UserId(1))).await.unwrap();

        // Deductions of 3 units against 10: only three can ever apply.
        let jobs = (0..12).map(|i| {
            let ledger = &ledger;
            async move {
                let adj = StockAdjustment::new(store_id, PRODUCT, Quantity::from(-3), Actor::customer(UserId(i)))
                    .with_reason("burst");
                ledger.adjust_stock(adj).await
            }
        });
        let results = join_all(jobs).await;
        let applied = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(applied, 3);
        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(result, FulfillmentError::InsufficientStock { .. }), "unexpected error: {result}");
        }

        let mut session = db.begin().await.unwrap();
        let record = session.fetch_stock(store.id, PRODUCT).await.unwrap().unwrap();
        assert_eq!(record.stock, Quantity::from(1));
        session.rollback().await.unwrap();

        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        Sqlite::drop_database(&url).await.unwrap();
    });
}
