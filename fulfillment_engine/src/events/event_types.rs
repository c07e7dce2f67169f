use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Mutation, MutationStatus, MutationStatusUpdate, OrderId},
    fe_api::allocation_objects::AllocationReport,
};

/// A new inter-store transfer was requested, either by the allocator or manually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRequestedEvent {
    pub mutation: Mutation,
    pub initial_update: MutationStatusUpdate,
}

impl MutationRequestedEvent {
    pub fn new(mutation: Mutation, initial_update: MutationStatusUpdate) -> Self {
        Self { mutation, initial_update }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStatusChangedEvent {
    pub mutation: Mutation,
    pub old_status: MutationStatus,
}

impl MutationStatusChangedEvent {
    pub fn new(mutation: Mutation, old_status: MutationStatus) -> Self {
        Self { mutation, old_status }
    }

    pub fn new_status(&self) -> MutationStatus {
        self.mutation.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAllocatedEvent {
    pub order_id: OrderId,
    pub report: AllocationReport,
}

impl OrderAllocatedEvent {
    pub fn new(order_id: OrderId, report: AllocationReport) -> Self {
        Self { order_id, report }
    }
}

/// Allocation for an order failed and was rolled back. The order needs manual attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationFailedEvent {
    pub order_id: OrderId,
    pub reason: String,
}

impl AllocationFailedEvent {
    pub fn new<S: Into<String>>(order_id: OrderId, reason: S) -> Self {
        Self { order_id, reason: reason.into() }
    }
}
