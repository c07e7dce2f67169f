use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};
use storefront_common::{GeoPoint, Quantity};

use crate::{
    db::sqlite::{bad_data, SqliteDatabaseError},
    db_types::{NewStore, ProductId, Store, StoreId, StoreStock},
};

#[derive(Debug, FromRow)]
struct StoreRow {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = SqliteDatabaseError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let location = GeoPoint::new(row.latitude, row.longitude).map_err(bad_data)?;
        Ok(Store { id: StoreId(row.id), name: row.name, location, created_at: row.created_at })
    }
}

#[derive(Debug, FromRow)]
struct StoreStockRow {
    #[sqlx(flatten)]
    store: StoreRow,
    product_id: i64,
    stock: i64,
}

pub async fn insert_store(store: NewStore, conn: &mut SqliteConnection) -> Result<Store, SqliteDatabaseError> {
    let row: StoreRow = sqlx::query_as(
        r#"
            INSERT INTO stores (name, latitude, longitude, created_at) VALUES (?, ?, ?, ?)
            RETURNING id, name, latitude, longitude, created_at;
        "#,
    )
    .bind(store.name)
    .bind(store.location.latitude())
    .bind(store.location.longitude())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("🏬️ Store {} ({}) inserted", row.id, row.name);
    row.try_into()
}

pub async fn fetch_store(store_id: StoreId, conn: &mut SqliteConnection) -> Result<Option<Store>, SqliteDatabaseError> {
    let row: Option<StoreRow> =
        sqlx::query_as("SELECT id, name, latitude, longitude, created_at FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(conn)
            .await?;
    row.map(Store::try_from).transpose()
}

pub async fn fetch_stores(conn: &mut SqliteConnection) -> Result<Vec<Store>, SqliteDatabaseError> {
    let rows: Vec<StoreRow> =
        sqlx::query_as("SELECT id, name, latitude, longitude, created_at FROM stores ORDER BY id ASC")
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(Store::try_from).collect()
}

pub async fn fetch_stores_stocking(
    product_id: ProductId,
    min_stock: Quantity,
    conn: &mut SqliteConnection,
) -> Result<Vec<StoreStock>, SqliteDatabaseError> {
    let rows: Vec<StoreStockRow> = sqlx::query_as(
        r#"
            SELECT s.id, s.name, s.latitude, s.longitude, s.created_at, i.product_id, i.stock
            FROM inventories i JOIN stores s ON s.id = i.store_id
            WHERE i.product_id = ? AND i.stock >= ?
            ORDER BY s.id ASC;
        "#,
    )
    .bind(product_id)
    .bind(min_stock)
    .fetch_all(conn)
    .await?;
    trace!("🏬️ {} stores hold at least {min_stock} of product {product_id}", rows.len());
    rows.into_iter()
        .map(|row| -> Result<StoreStock, SqliteDatabaseError> {
            Ok(StoreStock {
                store: row.store.try_into()?,
                product_id: ProductId(row.product_id),
                stock: Quantity::from(row.stock),
            })
        })
        .collect()
}
