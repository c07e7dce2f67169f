use storefront_common::Quantity;

use crate::db_types::{NewStore, ProductId, Store, StoreId, StoreStock};

/// The directory of physical stores, their locations and stocked products.
#[allow(async_fn_in_trait)]
pub trait StoreDirectory {
    type Error: std::error::Error;

    async fn insert_store(&mut self, store: NewStore) -> Result<Store, Self::Error>;

    async fn fetch_store(&mut self, store_id: StoreId) -> Result<Option<Store>, Self::Error>;

    async fn fetch_stores(&mut self) -> Result<Vec<Store>, Self::Error>;

    /// Every store holding at least `min_stock` units of the product, in no particular order.
    async fn fetch_stores_stocking(
        &mut self,
        product_id: ProductId,
        min_stock: Quantity,
    ) -> Result<Vec<StoreStock>, Self::Error>;
}
