use std::collections::HashMap;

use cucumber::World;
use fulfillment_engine::{
    db_types::{Mutation, MutationQueryFilter, OrderId, StoreId},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AllocationReport,
    EngineConfig,
    FulfillmentAllocator,
    FulfillmentError,
    InventoryLedger,
    MutationWorkflow,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use storefront_common::GeoPoint;

#[derive(Default, Debug, World)]
pub struct FulfillmentWorld {
    pub system: Option<FulfillmentSystem>,
    /// Stores by the name used in the feature files
    pub stores: HashMap<String, (StoreId, GeoPoint)>,
    /// Orders by the label used in the feature files
    pub orders: HashMap<String, OrderId>,
    pub last_allocation: Option<Result<AllocationReport, FulfillmentError>>,
    pub last_error: Option<String>,
    pub next_order_id: i64,
}

#[derive(Debug)]
pub struct FulfillmentSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub ledger: InventoryLedger<SqliteDatabase>,
    pub allocator: FulfillmentAllocator<SqliteDatabase>,
    pub workflow: MutationWorkflow<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
}

impl FulfillmentSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("🚀️ Created database: {db_path}");
        let producers = EventProducers::default();
        Self {
            ledger: InventoryLedger::new(db.clone()),
            allocator: FulfillmentAllocator::new(db.clone(), producers.clone()),
            workflow: MutationWorkflow::new(db.clone(), producers.clone()),
            orders: OrderFlowApi::new(db.clone(), producers),
            db_path,
            db,
        }
    }

    pub fn with_max_alternate_stores(mut self, max: usize) -> Self {
        let config = EngineConfig::default().with_max_alternate_stores(max);
        let producers = EventProducers::default();
        self.allocator = FulfillmentAllocator::from_config(self.db.clone(), producers.clone(), &config);
        self.orders = OrderFlowApi::from_config(self.db.clone(), producers, &config);
        self
    }
}

impl FulfillmentWorld {
    pub fn system(&self) -> &FulfillmentSystem {
        self.system.as_ref().expect("Fulfillment system not initialised")
    }

    pub fn store(&self, name: &str) -> StoreId {
        self.stores.get(name).map(|(id, _)| *id).unwrap_or_else(|| panic!("No store called {name}"))
    }

    pub fn location(&self, name: &str) -> GeoPoint {
        self.stores.get(name).map(|(_, p)| *p).unwrap_or_else(|| panic!("No store called {name}"))
    }

    pub fn order(&self, label: &str) -> OrderId {
        *self.orders.get(label).unwrap_or_else(|| panic!("No order called {label}"))
    }

    /// Ids for allocations that run without an order record. Kept clear of the ids the database hands out.
    pub fn new_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId(10_000 + self.next_order_id)
    }

    /// Every mutation from `from` to `to`, oldest first.
    pub async fn mutations_between(&self, from: &str, to: &str) -> Vec<Mutation> {
        let to = self.store(to);
        let filter = MutationQueryFilter::default().outgoing_from(self.store(from));
        let mutations = self.system().workflow.search(filter).await.expect("Error fetching mutations");
        mutations.into_iter().filter(|m| m.to_store_id == to).collect()
    }

    pub async fn latest_mutation_between(&self, from: &str, to: &str) -> Mutation {
        self.mutations_between(from, to).await.pop().unwrap_or_else(|| panic!("No mutation from {from} to {to}"))
    }
}
