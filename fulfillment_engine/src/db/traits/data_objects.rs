use crate::db_types::{Mutation, MutationStatusUpdate};

/// A freshly inserted mutation, together with the initiating status update that was written alongside it.
#[derive(Debug, Clone)]
pub struct InsertMutationResult {
    pub mutation: Mutation,
    pub initial_update: MutationStatusUpdate,
}
