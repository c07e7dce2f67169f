use crate::{
    db::traits::InsertMutationResult,
    db_types::{Mutation, MutationId, MutationQueryFilter, MutationStatus, MutationStatusUpdate, NewMutation, NewMutationStatusUpdate},
};

/// Persistence for inter-store transfer requests ("mutations") and their append-only status history.
#[allow(async_fn_in_trait)]
pub trait MutationManagement {
    type Error: std::error::Error;

    /// Inserts a mutation in `REQUESTED` state together with its initiating status update. A mutation must never
    /// exist without that first entry, so both rows are written in the same unit of work.
    async fn insert_mutation(&mut self, mutation: NewMutation) -> Result<InsertMutationResult, Self::Error>;

    async fn fetch_mutation(&mut self, id: MutationId) -> Result<Option<Mutation>, Self::Error>;

    /// The status history of a mutation, oldest first.
    async fn fetch_status_updates(&mut self, id: MutationId) -> Result<Vec<MutationStatusUpdate>, Self::Error>;

    /// Moves the mutation from `expected` to `update.status` and appends the update to its history.
    ///
    /// This is a compare-and-set: if the mutation is not currently in `expected` state (or does not exist), nothing
    /// is written and `None` is returned. It does *not* validate the transition itself.
    async fn transition_mutation(
        &mut self,
        id: MutationId,
        expected: MutationStatus,
        update: NewMutationStatusUpdate,
    ) -> Result<Option<Mutation>, Self::Error>;

    /// Fetches mutations according to the filter, oldest first.
    async fn fetch_mutations(&mut self, filter: MutationQueryFilter) -> Result<Vec<Mutation>, Self::Error>;
}
