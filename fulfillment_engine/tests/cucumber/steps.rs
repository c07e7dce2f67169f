use std::str::FromStr;

use cucumber::{given, then, when};
use fulfillment_engine::{
    db_types::{Actor, MutationStatus, NewMutation, NewOrder, OrderLineItem, OrderStatusType, ProductId, UserId},
    DatabaseSession,
    FulfillmentDatabase,
    FulfillmentError,
    OrderManagement,
};
use log::*;
use storefront_common::Quantity;

use crate::cucumber::FulfillmentWorld;

fn admin() -> Actor {
    Actor::admin(UserId(1))
}

//----------------------------------------------   Allocation  ----------------------------------------------------
#[when(expr = "customer {int} needs {int} units of product {int} from store {string}")]
async fn allocate(world: &mut FulfillmentWorld, customer: i64, qty: i64, product: i64, store: String) {
    let order_id = world.new_order_id();
    let nearest = world.store(&store);
    let delivery = world.location(&store);
    let items = [OrderLineItem::new(ProductId(product), Quantity::from(qty))];
    let result =
        world.system().allocator.allocate_stock_for_order(&items, delivery, nearest, order_id, UserId(customer)).await;
    debug!("🚀️ Allocation result for {order_id}: {result:?}");
    world.last_allocation = Some(result);
}

#[then("the allocation succeeds")]
async fn allocation_succeeds(world: &mut FulfillmentWorld) {
    match world.last_allocation.as_ref().expect("No allocation was attempted") {
        Ok(report) => info!("🚀️ Allocated: {report:?}"),
        Err(e) => panic!("Allocation failed: {e}"),
    }
}

#[then(expr = "the allocation fails with a shortfall of {int} units of product {int}")]
async fn allocation_fails(world: &mut FulfillmentWorld, shortfall: i64, product: i64) {
    let result = world.last_allocation.as_ref().expect("No allocation was attempted");
    let expected = FulfillmentError::InsufficientStoreCapacity {
        product_id: ProductId(product),
        shortfall: Quantity::from(shortfall),
    };
    assert_eq!(result.as_ref().err(), Some(&expected));
}

#[then(expr = "store {string} holds {int} units of product {int}")]
async fn store_holds(world: &mut FulfillmentWorld, store: String, qty: i64, product: i64) {
    let store_id = world.store(&store);
    let availability = world
        .system()
        .ledger
        .check_availability(store_id, ProductId(product), Quantity::from(1))
        .await
        .expect("Error checking stock");
    assert_eq!(availability.available_stock, Quantity::from(qty), "Unexpected stock in {store}");
}

//----------------------------------------------   Mutations   ----------------------------------------------------
#[then(expr = "there is/are {int} requested mutation(s) from {string} to {string} for {int} units")]
async fn requested_mutations(world: &mut FulfillmentWorld, count: usize, from: String, to: String, qty: i64) {
    let mutations = world.mutations_between(&from, &to).await;
    let matching = mutations
        .iter()
        .filter(|m| m.status == MutationStatus::Requested && m.quantity == Some(Quantity::from(qty)))
        .count();
    assert_eq!(matching, count, "Mutations from {from} to {to}: {mutations:?}");
}

#[then("no mutations were requested")]
async fn no_mutations(world: &mut FulfillmentWorld) {
    let all = world.system().workflow.search(Default::default()).await.expect("Error fetching mutations");
    assert!(all.is_empty(), "Unexpected mutations: {all:?}");
}

#[given(expr = "an admin requests a transfer from {string} to {string}")]
async fn manual_mutation(world: &mut FulfillmentWorld, from: String, to: String) {
    let request = NewMutation::new(
        world.store(&from),
        world.store(&to),
        admin(),
        format!("Shelf top-up for {to}"),
    );
    world.system().workflow.create_mutation(request).await.expect("Error creating mutation");
}

#[when(expr = "an admin {word} the mutation from {string} to {string}")]
async fn change_mutation(world: &mut FulfillmentWorld, action: String, from: String, to: String) {
    let mutation = world.latest_mutation_between(&from, &to).await;
    let workflow = &world.system().workflow;
    let result = match action.as_str() {
        "approves" => workflow.approve(mutation.id, admin(), "approved").await,
        "rejects" => workflow.reject(mutation.id, admin(), "rejected").await,
        "completes" => workflow.complete(mutation.id, admin(), "goods received").await,
        other => panic!("Unknown mutation action: {other}"),
    };
    world.last_error = result.err().map(|e| e.to_string());
}

#[then(expr = "the mutation from {string} to {string} is {word}")]
async fn mutation_status(world: &mut FulfillmentWorld, from: String, to: String, status: String) {
    let expected = MutationStatus::from_str(&status).expect("Not a mutation status");
    let mutation = world.latest_mutation_between(&from, &to).await;
    assert_eq!(mutation.status, expected);
}

#[then(expr = "the mutation from {string} to {string} has {int} history entries")]
async fn mutation_history(world: &mut FulfillmentWorld, from: String, to: String, count: usize) {
    let mutation = world.latest_mutation_between(&from, &to).await;
    let history = world.system().workflow.history(mutation.id).await.expect("Error fetching history");
    assert_eq!(history.len(), count);
}

#[then("the change is refused")]
async fn change_refused(world: &mut FulfillmentWorld) {
    let err = world.last_error.take().expect("The change was accepted");
    info!("🚀️ Refused as expected: {err}");
}

//----------------------------------------------     Orders    ----------------------------------------------------
#[given(expr = "customer {int} places order {word} for {int} units of product {int} near store {string}")]
async fn place_order(world: &mut FulfillmentWorld, customer: i64, label: String, qty: i64, product: i64, store: String) {
    let order = NewOrder::new(UserId(customer), world.store(&store), world.location(&store))
        .with_item(OrderLineItem::new(ProductId(product), Quantity::from(qty)));
    let mut session = world.system().db.begin().await.expect("Error starting session");
    let order = session.insert_order(order).await.expect("Error inserting order");
    session.commit().await.expect("Error committing order");
    world.orders.insert(label, order.id);
}

#[when(expr = "customer {int} uploads payment proof {string} for order {word}")]
async fn upload_proof(world: &mut FulfillmentWorld, customer: i64, image: String, label: String) {
    let order_id = world.order(&label);
    let result = world.system().orders.submit_payment_proof(order_id, &image, Actor::customer(UserId(customer))).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "an admin {word} the payment for order {word}")]
async fn review_payment(world: &mut FulfillmentWorld, action: String, label: String) {
    let order_id = world.order(&label);
    let orders = &world.system().orders;
    let result = match action.as_str() {
        "approves" => orders.approve_payment(order_id, admin()).await,
        "rejects" => orders.reject_payment(order_id, admin(), "image is unreadable").await,
        other => panic!("Unknown payment action: {other}"),
    };
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "order {word} is accepted")]
async fn accept_order(world: &mut FulfillmentWorld, label: String) {
    let order_id = world.order(&label);
    let result = world.system().orders.accept_order(order_id).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "an admin {word} order {word}")]
async fn progress_order(world: &mut FulfillmentWorld, action: String, label: String) {
    let order_id = world.order(&label);
    let orders = &world.system().orders;
    let result = match action.as_str() {
        "ships" => orders.ship_order(order_id, admin()).await,
        "cancels" => orders.cancel_order(order_id, admin(), "customer asked").await,
        "confirms" => orders.confirm_delivery(order_id, admin()).await,
        other => panic!("Unknown order action: {other}"),
    };
    world.last_error = result.err().map(|e| e.to_string());
}

#[then(expr = "order {word} has status {word}")]
async fn order_status(world: &mut FulfillmentWorld, label: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let order = world.system().orders.order(world.order(&label)).await.expect("Error fetching order");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} is allocated")]
async fn order_allocated(world: &mut FulfillmentWorld, label: String) {
    let order = world.system().orders.order(world.order(&label)).await.expect("Error fetching order");
    assert!(order.allocated_at.is_some(), "Order {label} was not allocated");
}

#[then(expr = "order {word} has {int} history entries")]
async fn order_history(world: &mut FulfillmentWorld, label: String, count: usize) {
    let history = world.system().orders.order_history(world.order(&label)).await.expect("Error fetching history");
    assert_eq!(history.len(), count, "History: {history:?}");
}
