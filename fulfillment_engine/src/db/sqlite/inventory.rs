use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};
use storefront_common::Quantity;

use crate::{
    db::sqlite::{bad_data, SqliteDatabaseError},
    db_types::{
        Actor,
        ActorRole,
        InventoryRecord,
        OrderId,
        ProductId,
        StockAdjustment,
        StockJournalEntry,
        StockUpdateResult,
        StoreId,
        UserId,
    },
};

#[derive(Debug, FromRow)]
struct InventoryRow {
    store_id: i64,
    product_id: i64,
    stock: i64,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        Self {
            store_id: StoreId(row.store_id),
            product_id: ProductId(row.product_id),
            stock: Quantity::from(row.stock),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JournalRow {
    id: i64,
    store_id: i64,
    product_id: i64,
    delta: i64,
    resulting_stock: i64,
    order_id: Option<i64>,
    actor_id: i64,
    actor_role: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JournalRow> for StockJournalEntry {
    type Error = SqliteDatabaseError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        let role = row.actor_role.parse::<ActorRole>().map_err(bad_data)?;
        Ok(Self {
            id: row.id,
            store_id: StoreId(row.store_id),
            product_id: ProductId(row.product_id),
            delta: Quantity::from(row.delta),
            resulting_stock: Quantity::from(row.resulting_stock),
            order_id: row.order_id.map(OrderId),
            actor: Actor { id: UserId(row.actor_id), role },
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

pub async fn fetch_stock(
    store_id: StoreId,
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryRecord>, SqliteDatabaseError> {
    let row: Option<InventoryRow> = sqlx::query_as(
        "SELECT store_id, product_id, stock, updated_at FROM inventories WHERE store_id = ? AND product_id = ?",
    )
    .bind(store_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(InventoryRecord::from))
}

/// Applies the stock delta with a single conditional `UPDATE`, so the check and the write cannot be separated by
/// another writer. The journal row is written on the same connection; wrap the call in a transaction (which every
/// [`crate::db::sqlite::SqliteSession`] is) for the two to be atomic.
pub async fn apply_stock_delta(
    adjustment: &StockAdjustment,
    conn: &mut SqliteConnection,
) -> Result<StockUpdateResult, SqliteDatabaseError> {
    let now = Utc::now();
    if adjustment.delta.is_positive() {
        sqlx::query(
            r#"INSERT INTO inventories (store_id, product_id, stock, updated_at) VALUES (?, ?, 0, ?)
            ON CONFLICT (store_id, product_id) DO NOTHING"#,
        )
        .bind(adjustment.store_id)
        .bind(adjustment.product_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }
    let updated: Option<InventoryRow> = sqlx::query_as(
        r#"
            UPDATE inventories SET stock = stock + ?, updated_at = ?
            WHERE store_id = ? AND product_id = ? AND stock + ? >= 0 AND stock <= ?
            RETURNING store_id, product_id, stock, updated_at;
        "#,
    )
    .bind(adjustment.delta)
    .bind(now)
    .bind(adjustment.store_id)
    .bind(adjustment.product_id)
    .bind(adjustment.delta)
    // sqlite silently turns an overflowing integer sum into a REAL
    .bind(i64::MAX.saturating_sub(adjustment.delta.value()))
    .fetch_optional(&mut *conn)
    .await?;
    let record = match updated {
        Some(row) => InventoryRecord::from(row),
        None => {
            let result = match fetch_stock(adjustment.store_id, adjustment.product_id, conn).await? {
                Some(current) if current.stock.checked_add(adjustment.delta).is_none() => {
                    StockUpdateResult::Overflow { current: current.stock }
                },
                Some(current) => StockUpdateResult::Insufficient { available: current.stock },
                None => StockUpdateResult::NoRecord,
            };
            debug!(
                "📦️ Stock adjustment of {} for product {} at store {} was not applied: {result:?}",
                adjustment.delta, adjustment.product_id, adjustment.store_id
            );
            return Ok(result);
        },
    };
    insert_journal_entry(adjustment, record.stock, conn).await?;
    trace!(
        "📦️ Stock for product {} at store {} adjusted by {} to {}",
        record.product_id,
        record.store_id,
        adjustment.delta,
        record.stock
    );
    Ok(StockUpdateResult::Applied(record))
}

async fn insert_journal_entry(
    adjustment: &StockAdjustment,
    resulting_stock: Quantity,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO stock_journal
                (store_id, product_id, delta, resulting_stock, order_id, actor_id, actor_role, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
        "#,
    )
    .bind(adjustment.store_id)
    .bind(adjustment.product_id)
    .bind(adjustment.delta)
    .bind(resulting_stock)
    .bind(adjustment.order_id)
    .bind(adjustment.actor.id)
    .bind(adjustment.actor.role.to_string())
    .bind(adjustment.reason.as_deref())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_stock_journal_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockJournalEntry>, SqliteDatabaseError> {
    let rows: Vec<JournalRow> = sqlx::query_as(
        r#"
            SELECT id, store_id, product_id, delta, resulting_stock, order_id, actor_id, actor_role, reason, created_at
            FROM stock_journal WHERE order_id = ? ORDER BY id ASC;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(StockJournalEntry::try_from).collect()
}
