use std::fmt::Display;

use storefront_common::Quantity;
use thiserror::Error;

use crate::db_types::{MutationId, MutationStatus, OrderId, OrderStatusType, ProductId, StoreId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("Store {store_id} holds {available} of product {product_id}, but {requested} were requested")]
    InsufficientStock { store_id: StoreId, product_id: ProductId, available: Quantity, requested: Quantity },
    #[error("No combination of stores can supply product {product_id}. {shortfall} items are missing")]
    InsufficientStoreCapacity { product_id: ProductId, shortfall: Quantity },
    #[error("Mutation {mutation_id} cannot move from {from} to {to}")]
    InvalidTransition { mutation_id: MutationId, from: MutationStatus, to: MutationStatus },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Mutation {0} does not exist")]
    MutationNotFound(MutationId),
    #[error("Store {0} does not exist")]
    StoreNotFound(StoreId),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl FulfillmentError {
    pub fn database<E: Display>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusChange { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Stock has already been allocated to order {0}")]
    AlreadyAllocated(OrderId),
    #[error("Order {order_id} is {status}, so no stock can be allocated to it")]
    OrderClosed { order_id: OrderId, status: OrderStatusType },
    #[error("Order {0} has no payment proof")]
    PaymentProofMissing(OrderId),
    #[error(transparent)]
    Allocation(#[from] FulfillmentError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn database<E: Display>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
