use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use storefront_common::{GeoPoint, Quantity};

use crate::{
    db::sqlite::{bad_data, SqliteDatabaseError},
    db_types::{
        Actor,
        ActorRole,
        NewOrder,
        NewOrderStatusUpdate,
        Order,
        OrderId,
        OrderLineItem,
        OrderQueryFilter,
        OrderStatusType,
        OrderStatusUpdate,
        PaymentProof,
        PaymentStatus,
        ProductId,
        StoreId,
        UserId,
    },
};

const ORDER_COLUMNS: &str = "id, customer_id, nearest_store_id, delivery_latitude, delivery_longitude, status, \
                             allocated_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    nearest_store_id: i64,
    delivery_latitude: f64,
    delivery_longitude: f64,
    status: String,
    allocated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, line_items: Vec<OrderLineItem>) -> Result<Order, SqliteDatabaseError> {
        let delivery = GeoPoint::new(self.delivery_latitude, self.delivery_longitude).map_err(bad_data)?;
        Ok(Order {
            id: OrderId(self.id),
            customer_id: UserId(self.customer_id),
            nearest_store_id: StoreId(self.nearest_store_id),
            delivery,
            status: self.status.parse::<OrderStatusType>().map_err(bad_data)?,
            line_items,
            allocated_at: self.allocated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    product_id: i64,
    quantity: i64,
    final_quantity: i64,
}

impl From<LineItemRow> for OrderLineItem {
    fn from(row: LineItemRow) -> Self {
        OrderLineItem::new(ProductId(row.product_id), Quantity::from(row.quantity))
            .with_final_quantity(Quantity::from(row.final_quantity))
    }
}

#[derive(Debug, FromRow)]
struct StatusUpdateRow {
    id: i64,
    order_id: i64,
    status: String,
    actor_id: i64,
    actor_role: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StatusUpdateRow> for OrderStatusUpdate {
    type Error = SqliteDatabaseError;

    fn try_from(row: StatusUpdateRow) -> Result<Self, Self::Error> {
        let role = row.actor_role.parse::<ActorRole>().map_err(bad_data)?;
        Ok(Self {
            id: row.id,
            order_id: OrderId(row.order_id),
            status: row.status.parse::<OrderStatusType>().map_err(bad_data)?,
            actor: Actor { id: UserId(row.actor_id), role },
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentProofRow {
    order_id: i64,
    image_ref: String,
    status: String,
    uploaded_by: i64,
    reviewed_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentProofRow> for PaymentProof {
    type Error = SqliteDatabaseError;

    fn try_from(row: PaymentProofRow) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: OrderId(row.order_id),
            image_ref: row.image_ref,
            status: row.status.parse::<PaymentStatus>().map_err(bad_data)?,
            uploaded_by: UserId(row.uploaded_by),
            reviewed_by: row.reviewed_by.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Inserts the order, its line items and the initial `AwaitingPayment` status entry.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let status = OrderStatusType::AwaitingPayment;
    let row: OrderRow = sqlx::query_as(&format!(
        r#"
            INSERT INTO orders (customer_id, nearest_store_id, delivery_latitude, delivery_longitude, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {ORDER_COLUMNS};
        "#
    ))
    .bind(order.customer_id)
    .bind(order.nearest_store_id)
    .bind(order.delivery.latitude())
    .bind(order.delivery.longitude())
    .bind(status.to_string())
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    let order_id = OrderId(row.id);
    for item in &order.line_items {
        sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, final_quantity) VALUES (?, ?, ?, ?)")
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.final_quantity)
            .execute(&mut *conn)
            .await?;
    }
    let customer = Actor::customer(order.customer_id);
    insert_status_update(order_id, &NewOrderStatusUpdate::new(status, customer), conn).await?;
    debug!("🧾️ Order {order_id} inserted with {} line items", order.line_items.len());
    row.into_order(order.line_items)
}

async fn fetch_line_items(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderLineItem>, SqliteDatabaseError> {
    let rows: Vec<LineItemRow> =
        sqlx::query_as("SELECT product_id, quantity, final_quantity FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(OrderLineItem::from).collect())
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let items = fetch_line_items(OrderId(row.id), conn).await?;
    row.into_order(items)
}

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => hydrate(row, conn).await.map(Some),
        None => Ok(None),
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order, i.e. newest first
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id);
    }
    if let Some(since) = query.created_after {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.created_before {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
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
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("🧾️ Executing query: {}", builder.sql());
    let rows: Vec<OrderRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    trace!("🧾️ Result of fetch_orders: {}", rows.len());
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, conn).await?);
    }
    Ok(orders)
}

async fn insert_status_update(
    order_id: OrderId,
    update: &NewOrderStatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO order_status_updates (order_id, status, actor_id, actor_role, note, created_at)
            VALUES (?, ?, ?, ?, ?, ?);
        "#,
    )
    .bind(order_id)
    .bind(update.status.to_string())
    .bind(update.actor.id)
    .bind(update.actor.role.to_string())
    .bind(update.note.as_deref())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_order_status(
    order_id: OrderId,
    expected: OrderStatusType,
    update: NewOrderStatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r#"
            UPDATE orders SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {ORDER_COLUMNS};
        "#
    ))
    .bind(update.status.to_string())
    .bind(Utc::now())
    .bind(order_id)
    .bind(expected.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        trace!("🧾️ Order {order_id} is not in {expected} state. No update applied.");
        return Ok(None);
    };
    insert_status_update(order_id, &update, conn).await?;
    debug!("🧾️ Order {order_id} moved from {expected} to {}", update.status);
    hydrate(row, conn).await.map(Some)
}

pub async fn append_order_note(
    order_id: OrderId,
    update: NewOrderStatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    insert_status_update(order_id, &update, conn).await
}

pub async fn fetch_order_status_history(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusUpdate>, SqliteDatabaseError> {
    let rows: Vec<StatusUpdateRow> = sqlx::query_as(
        r#"
            SELECT id, order_id, status, actor_id, actor_role, note, created_at
            FROM order_status_updates WHERE order_id = ? ORDER BY id ASC;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(OrderStatusUpdate::try_from).collect()
}

pub async fn mark_order_allocated(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let now = Utc::now();
    let result = sqlx::query("UPDATE orders SET allocated_at = ?, updated_at = ? WHERE id = ? AND allocated_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

const PROOF_COLUMNS: &str = "order_id, image_ref, status, uploaded_by, reviewed_by, created_at, updated_at";

pub async fn upsert_payment_proof(
    order_id: OrderId,
    image_ref: &str,
    uploaded_by: UserId,
    conn: &mut SqliteConnection,
) -> Result<PaymentProof, SqliteDatabaseError> {
    let now = Utc::now();
    let pending = PaymentStatus::Pending.to_string();
    let row: PaymentProofRow = sqlx::query_as(&format!(
        r#"
            INSERT INTO payment_proofs (order_id, image_ref, status, uploaded_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (order_id) DO UPDATE SET
                image_ref = excluded.image_ref,
                status = excluded.status,
                uploaded_by = excluded.uploaded_by,
                reviewed_by = NULL,
                updated_at = excluded.updated_at
            RETURNING {PROOF_COLUMNS};
        "#
    ))
    .bind(order_id)
    .bind(image_ref)
    .bind(pending)
    .bind(uploaded_by)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🧾️ Payment proof for order {order_id} stored");
    row.try_into()
}

pub async fn fetch_payment_proof(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentProof>, SqliteDatabaseError> {
    let row: Option<PaymentProofRow> =
        sqlx::query_as(&format!("SELECT {PROOF_COLUMNS} FROM payment_proofs WHERE order_id = ?"))
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    row.map(PaymentProof::try_from).transpose()
}

pub async fn update_payment_status(
    order_id: OrderId,
    status: PaymentStatus,
    reviewed_by: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentProof>, SqliteDatabaseError> {
    let row: Option<PaymentProofRow> = sqlx::query_as(&format!(
        r#"
            UPDATE payment_proofs SET status = ?, reviewed_by = ?, updated_at = ?
            WHERE order_id = ?
            RETURNING {PROOF_COLUMNS};
        "#
    ))
    .bind(status.to_string())
    .bind(reviewed_by)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    row.map(PaymentProof::try_from).transpose()
}
