use cucumber::given;
use fulfillment_engine::{
    db_types::{Actor, NewStore, ProductId, UserId},
    FulfillmentDatabase,
    DatabaseSession,
    StoreDirectory,
};
use storefront_common::{GeoPoint, Quantity};

use crate::cucumber::{fulfillment_world::FulfillmentSystem, FulfillmentWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut FulfillmentWorld) {
    let system = FulfillmentSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "the allocator may draw from at most {int} alternate store(s)")]
async fn limit_fan_out(world: &mut FulfillmentWorld, max: usize) {
    let system = world.system.take().expect("Fulfillment system not initialised");
    world.system = Some(system.with_max_alternate_stores(max));
}

#[given(regex = r#"^a store "([^"]+)" at (-?\d+(?:\.\d+)?), (-?\d+(?:\.\d+)?)$"#)]
async fn add_store(world: &mut FulfillmentWorld, name: String, lat: String, lon: String) {
    let location = GeoPoint::from_strings(&lat, &lon).expect("Invalid store location");
    let mut session = world.system().db.begin().await.expect("Error starting session");
    let store = session.insert_store(NewStore::new(name.clone(), location)).await.expect("Error adding store");
    session.commit().await.expect("Error committing store");
    world.stores.insert(name, (store.id, location));
}

#[given(expr = "store {string} holds {int} units of product {int}")]
async fn stock_store(world: &mut FulfillmentWorld, name: String, qty: i64, product: i64) {
    let store = world.store(&name);
    world
        .system()
        .ledger
        .set_stock(store, ProductId(product), Quantity::from(qty), Actor::admin(UserId(1)))
        .await
        .expect("Error setting stock");
}
