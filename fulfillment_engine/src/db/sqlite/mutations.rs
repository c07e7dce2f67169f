use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use storefront_common::Quantity;

use crate::{
    db::{
        sqlite::{bad_data, SqliteDatabaseError},
        traits::InsertMutationResult,
    },
    db_types::{
        Mutation,
        MutationDirection,
        MutationId,
        MutationQueryFilter,
        MutationStatus,
        MutationStatusUpdate,
        NewMutation,
        NewMutationStatusUpdate,
        OrderId,
        ProductId,
        StoreId,
        UserId,
    },
};

const MUTATION_COLUMNS: &str =
    "id, from_store_id, to_store_id, status, product_id, quantity, order_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct MutationRow {
    id: i64,
    from_store_id: i64,
    to_store_id: i64,
    status: String,
    product_id: Option<i64>,
    quantity: Option<i64>,
    order_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MutationRow> for Mutation {
    type Error = SqliteDatabaseError;

    fn try_from(row: MutationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MutationId(row.id),
            from_store_id: StoreId(row.from_store_id),
            to_store_id: StoreId(row.to_store_id),
            status: row.status.parse::<MutationStatus>().map_err(bad_data)?,
            product_id: row.product_id.map(ProductId),
            quantity: row.quantity.map(Quantity::from),
            order_id: row.order_id.map(OrderId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StatusUpdateRow {
    id: i64,
    mutation_id: i64,
    creator_id: i64,
    status: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<StatusUpdateRow> for MutationStatusUpdate {
    type Error = SqliteDatabaseError;

    fn try_from(row: StatusUpdateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            mutation_id: MutationId(row.mutation_id),
            creator_id: UserId(row.creator_id),
            status: row.status.parse::<MutationStatus>().map_err(bad_data)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Inserts the mutation and its initiating `REQUESTED` status update. This is not atomic on its own. Call it with a
/// connection that is inside a transaction.
pub async fn insert_mutation(
    mutation: NewMutation,
    conn: &mut SqliteConnection,
) -> Result<InsertMutationResult, SqliteDatabaseError> {
    let now = Utc::now();
    let status = MutationStatus::Requested;
    let row: MutationRow = sqlx::query_as(&format!(
        r#"
            INSERT INTO mutations (from_store_id, to_store_id, status, product_id, quantity, order_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {MUTATION_COLUMNS};
        "#
    ))
    .bind(mutation.from_store_id)
    .bind(mutation.to_store_id)
    .bind(status.to_string())
    .bind(mutation.product_id)
    .bind(mutation.quantity)
    .bind(mutation.order_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let mutation_id = MutationId(row.id);
    let update = NewMutationStatusUpdate::new(status, mutation.requested_by, mutation.description);
    let initial_update = insert_status_update(mutation_id, &update, conn).await?;
    trace!(
        "🚚️ Mutation {mutation_id} from store {} to store {} inserted",
        mutation.from_store_id,
        mutation.to_store_id
    );
    Ok(InsertMutationResult { mutation: row.try_into()?, initial_update })
}

async fn insert_status_update(
    mutation_id: MutationId,
    update: &NewMutationStatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<MutationStatusUpdate, SqliteDatabaseError> {
    let row: StatusUpdateRow = sqlx::query_as(
        r#"
            INSERT INTO mutation_status_updates (mutation_id, creator_id, status, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, mutation_id, creator_id, status, description, created_at;
        "#,
    )
    .bind(mutation_id)
    .bind(update.actor.id)
    .bind(update.status.to_string())
    .bind(update.description.as_str())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    row.try_into()
}

pub async fn fetch_mutation(
    id: MutationId,
    conn: &mut SqliteConnection,
) -> Result<Option<Mutation>, SqliteDatabaseError> {
    let row: Option<MutationRow> = sqlx::query_as(&format!("SELECT {MUTATION_COLUMNS} FROM mutations WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.map(Mutation::try_from).transpose()
}

pub async fn fetch_status_updates(
    id: MutationId,
    conn: &mut SqliteConnection,
) -> Result<Vec<MutationStatusUpdate>, SqliteDatabaseError> {
    let rows: Vec<StatusUpdateRow> = sqlx::query_as(
        r#"
            SELECT id, mutation_id, creator_id, status, description, created_at
            FROM mutation_status_updates WHERE mutation_id = ? ORDER BY id ASC;
        "#,
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(MutationStatusUpdate::try_from).collect()
}

pub async fn transition_mutation(
    id: MutationId,
    expected: MutationStatus,
    update: NewMutationStatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Mutation>, SqliteDatabaseError> {
    let row: Option<MutationRow> = sqlx::query_as(&format!(
        r#"
            UPDATE mutations SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {MUTATION_COLUMNS};
        "#
    ))
    .bind(update.status.to_string())
    .bind(Utc::now())
    .bind(id)
    .bind(expected.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        trace!("🚚️ Mutation {id} is not in {expected} state. No update applied.");
        return Ok(None);
    };
    insert_status_update(id, &update, conn).await?;
    trace!("🚚️ Mutation {id} moved from {expected} to {}", update.status);
    row.try_into().map(Some)
}

/// Fetches mutations according to criteria specified in the `MutationQueryFilter`
///
/// Resulting mutations are ordered by `id` in ascending order
pub async fn fetch_mutations(
    query: MutationQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Mutation>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {MUTATION_COLUMNS} FROM mutations "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(store_id) = query.store_id {
        match query.direction {
            MutationDirection::Incoming => {
                where_clause.push("to_store_id = ");
                where_clause.push_bind_unseparated(store_id);
            },
            MutationDirection::Outgoing => {
                where_clause.push("from_store_id = ");
                where_clause.push_bind_unseparated(store_id);
            },
            MutationDirection::Either => {
                where_clause.push("(from_store_id = ");
                where_clause.push_bind_unseparated(store_id);
                where_clause.push_unseparated(" OR to_store_id = ");
                where_clause.push_bind_unseparated(store_id);
                where_clause.push_unseparated(")");
            },
        }
    }
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.to_string());
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY id ASC");

    trace!("🚚️ Executing query: {}", builder.sql());
    let rows: Vec<MutationRow> = builder.build_query_as().fetch_all(conn).await?;
    trace!("🚚️ Result of fetch_mutations: {}", rows.len());
    rows.into_iter().map(Mutation::try_from).collect()
}
