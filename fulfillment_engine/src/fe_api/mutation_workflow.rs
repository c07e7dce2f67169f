//! Inter-store stock transfer requests ("mutations") and their status workflow.
//!
//! ```text
//! REQUESTED -> APPROVED -> COMPLETED
//!           -> REJECTED
//! ```
//!
//! Completing a mutation does not move any stock. The units were already deducted from the sending store when the
//! order was allocated; completion only records that they arrived.
use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{DatabaseSession, FulfillmentDatabase, InsertMutationResult, MutationManagement, StoreDirectory},
    db_types::{
        Actor,
        Mutation,
        MutationId,
        MutationQueryFilter,
        MutationStatus,
        MutationStatusUpdate,
        NewMutation,
        NewMutationStatusUpdate,
        StoreId,
    },
    events::{EventProducers, MutationRequestedEvent, MutationStatusChangedEvent},
    fe_api::{errors::FulfillmentError, inventory_ledger::ensure_store_exists},
};

/// Creates the mutation in `REQUESTED` state, together with its initiating status update.
pub async fn create_mutation<S>(session: &mut S, mutation: NewMutation) -> Result<InsertMutationResult, FulfillmentError>
where S: MutationManagement + StoreDirectory {
    if mutation.from_store_id == mutation.to_store_id {
        return Err(FulfillmentError::InvalidMutation(format!(
            "store {} cannot request a transfer from itself",
            mutation.to_store_id
        )));
    }
    if let Some(qty) = mutation.quantity.filter(|q| !q.is_positive()) {
        return Err(FulfillmentError::InvalidQuantity(format!("a mutation must move at least one unit. Got {qty}")));
    }
    ensure_store_exists(session, mutation.from_store_id).await?;
    ensure_store_exists(session, mutation.to_store_id).await?;
    let result = session.insert_mutation(mutation).await.map_err(FulfillmentError::database)?;
    info!(
        "🚚️ Mutation {} requested from store {} to store {}: {}",
        result.mutation.id, result.mutation.from_store_id, result.mutation.to_store_id, result.initial_update.description
    );
    Ok(result)
}

/// Moves the mutation to `new_status` and appends the status update.
///
/// Fails with [`FulfillmentError::InvalidTransition`] if `new_status` is not reachable from the current status. The
/// write is a compare-and-set on the status that was checked, so a concurrent transition also surfaces as
/// `InvalidTransition`.
///
/// Returns the updated mutation and the status it had before.
pub async fn record_status_update<S: MutationManagement>(
    session: &mut S,
    mutation_id: MutationId,
    new_status: MutationStatus,
    actor: Actor,
    description: &str,
) -> Result<(Mutation, MutationStatus), FulfillmentError> {
    let current = session
        .fetch_mutation(mutation_id)
        .await
        .map_err(FulfillmentError::database)?
        .ok_or(FulfillmentError::MutationNotFound(mutation_id))?;
    let from = current.status;
    if !from.can_transition_to(new_status) {
        warn!("🚚️ {actor} tried to move mutation {mutation_id} from {from} to {new_status}");
        return Err(FulfillmentError::InvalidTransition { mutation_id, from, to: new_status });
    }
    let update = NewMutationStatusUpdate::new(new_status, actor, description);
    match session.transition_mutation(mutation_id, from, update).await.map_err(FulfillmentError::database)? {
        Some(mutation) => {
            info!("🚚️ Mutation {mutation_id} moved from {from} to {new_status} by {actor}");
            Ok((mutation, from))
        },
        None => {
            let latest = session
                .fetch_mutation(mutation_id)
                .await
                .map_err(FulfillmentError::database)?
                .map_or(from, |m| m.status);
            warn!("🚚️ Mutation {mutation_id} changed to {latest} before it could move to {new_status}");
            Err(FulfillmentError::InvalidTransition { mutation_id, from: latest, to: new_status })
        },
    }
}

/// `MutationWorkflow` creates transfer requests between stores and drives them through their status workflow.
pub struct MutationWorkflow<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for MutationWorkflow<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MutationWorkflow")
    }
}

impl<B> MutationWorkflow<B>
where B: FulfillmentDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Requests a transfer outside of order allocation, e.g. to rebalance stock between stores.
    pub async fn create_mutation(&self, mutation: NewMutation) -> Result<Mutation, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let result = create_mutation(&mut session, mutation).await?;
        session.commit().await.map_err(FulfillmentError::database)?;
        let mutation = result.mutation.clone();
        self.producers.publish_mutation_requested(MutationRequestedEvent::new(result.mutation, result.initial_update)).await;
        Ok(mutation)
    }

    pub async fn record_status_update(
        &self,
        mutation_id: MutationId,
        new_status: MutationStatus,
        actor: Actor,
        description: &str,
    ) -> Result<Mutation, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let (mutation, old_status) =
            record_status_update(&mut session, mutation_id, new_status, actor, description).await?;
        session.commit().await.map_err(FulfillmentError::database)?;
        self.producers.publish_mutation_status_changed(MutationStatusChangedEvent::new(mutation.clone(), old_status)).await;
        Ok(mutation)
    }

    pub async fn approve(&self, mutation_id: MutationId, actor: Actor, note: &str) -> Result<Mutation, FulfillmentError> {
        self.record_status_update(mutation_id, MutationStatus::Approved, actor, note).await
    }

    pub async fn reject(&self, mutation_id: MutationId, actor: Actor, reason: &str) -> Result<Mutation, FulfillmentError> {
        self.record_status_update(mutation_id, MutationStatus::Rejected, actor, reason).await
    }

    /// Records that the goods have arrived at the receiving store.
    pub async fn complete(&self, mutation_id: MutationId, actor: Actor, note: &str) -> Result<Mutation, FulfillmentError> {
        self.record_status_update(mutation_id, MutationStatus::Completed, actor, note).await
    }

    pub async fn mutation(&self, mutation_id: MutationId) -> Result<Mutation, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let mutation = session.fetch_mutation(mutation_id).await.map_err(FulfillmentError::database)?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        mutation.ok_or(FulfillmentError::MutationNotFound(mutation_id))
    }

    /// The status history of the mutation, oldest first. The first entry is always the `REQUESTED` one.
    pub async fn history(&self, mutation_id: MutationId) -> Result<Vec<MutationStatusUpdate>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let history = session.fetch_status_updates(mutation_id).await.map_err(FulfillmentError::database)?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        if history.is_empty() {
            return Err(FulfillmentError::MutationNotFound(mutation_id));
        }
        Ok(history)
    }

    /// Every mutation into or out of the store.
    pub async fn mutations_for_store(&self, store_id: StoreId) -> Result<Vec<Mutation>, FulfillmentError> {
        self.search(MutationQueryFilter::default().involving_store(store_id)).await
    }

    pub async fn search(&self, filter: MutationQueryFilter) -> Result<Vec<Mutation>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let mutations = session.fetch_mutations(filter).await.map_err(FulfillmentError::database)?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(mutations)
    }
}
