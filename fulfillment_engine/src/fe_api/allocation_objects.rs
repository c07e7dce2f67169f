use serde::{Deserialize, Serialize};
use storefront_common::{GeoPoint, Quantity};

use crate::{
    db::traits::InsertMutationResult,
    db_types::{MutationId, Order, OrderId, ProductId, StoreId, UserId},
};

/// Everything the allocator needs to know about the order, besides its line items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationTarget {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub nearest_store_id: StoreId,
    pub delivery: GeoPoint,
}

impl From<&Order> for AllocationTarget {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_id: order.customer_id,
            nearest_store_id: order.nearest_store_id,
            delivery: order.delivery,
        }
    }
}

/// Units taken from one store's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub store_id: StoreId,
    pub quantity: Quantity,
}

/// How a single line item was sourced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// The nearest store (if it contributed) comes first, followed by alternate stores nearest first.
    pub deductions: Vec<Deduction>,
    /// One mutation per contributing alternate store.
    pub mutation_ids: Vec<MutationId>,
}

impl LineAllocation {
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self { product_id, quantity, deductions: Vec::new(), mutation_ids: Vec::new() }
    }

    pub fn total_deducted(&self) -> Quantity {
        self.deductions.iter().map(|d| d.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub order_id: OrderId,
    pub lines: Vec<LineAllocation>,
}

impl AllocationReport {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id, lines: Vec::new() }
    }

    /// The total number of units taken from `store_id`, across every line item.
    pub fn deducted_from(&self, store_id: StoreId) -> Quantity {
        self.lines.iter().flat_map(|l| l.deductions.iter()).filter(|d| d.store_id == store_id).map(|d| d.quantity).sum()
    }

    pub fn mutation_ids(&self) -> Vec<MutationId> {
        self.lines.iter().flat_map(|l| l.mutation_ids.iter().copied()).collect()
    }

    /// True if every line item was served by the nearest store alone.
    pub fn is_local(&self) -> bool {
        self.lines.iter().all(|l| l.mutation_ids.is_empty())
    }
}

/// The report, plus the mutations created along the way so that their events can be published after commit.
#[derive(Debug, Clone)]
pub(crate) struct AllocationOutcome {
    pub report: AllocationReport,
    pub requested_mutations: Vec<InsertMutationResult>,
}
