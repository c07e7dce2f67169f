//! Finds stores that can supply a product, nearest first.
use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use storefront_common::{GeoPoint, Quantity};

use crate::{
    db::traits::{DatabaseSession, FulfillmentDatabase, StoreDirectory},
    db_types::{ProductId, Store, StoreId, StoreStock},
    fe_api::errors::FulfillmentError,
};

/// A store holding some stock of a product, and its distance from the point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCandidate {
    pub store: Store,
    pub stock: Quantity,
    pub distance_km: f64,
}

/// Orders stores by straight-line distance from `point`, nearest first. Stores at the same distance are ordered by
/// id.
pub fn rank_by_distance(point: &GeoPoint, stocks: Vec<StoreStock>) -> Vec<StoreCandidate> {
    let mut candidates = stocks
        .into_iter()
        .map(|s| {
            let distance_km = point.distance_km(&s.store.location);
            StoreCandidate { store: s.store, stock: s.stock, distance_km }
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km).then(a.store.id.cmp(&b.store.id)));
    candidates
}

/// Every store with a positive stock of the product, nearest to `point` first. `exclude` is typically the store that
/// has already been drawn from.
pub async fn rank_candidate_stores<S: StoreDirectory>(
    session: &mut S,
    point: &GeoPoint,
    product_id: ProductId,
    exclude: Option<StoreId>,
) -> Result<Vec<StoreCandidate>, FulfillmentError> {
    let stocks = session.fetch_stores_stocking(product_id, Quantity::from(1)).await.map_err(FulfillmentError::database)?;
    let stocks = stocks.into_iter().filter(|s| Some(s.store.id) != exclude).collect();
    let candidates = rank_by_distance(point, stocks);
    trace!("🏬️ {} candidate stores for product {product_id} near {point}", candidates.len());
    Ok(candidates)
}

/// The nearest store (other than `exclude`) holding any stock of the product. The store may hold less than
/// `required_qty`; a partial contribution still makes progress.
pub async fn find_alternate_store<S: StoreDirectory>(
    session: &mut S,
    point: &GeoPoint,
    product_id: ProductId,
    required_qty: Quantity,
    exclude: Option<StoreId>,
) -> Result<Option<StoreCandidate>, FulfillmentError> {
    if !required_qty.is_positive() {
        return Err(FulfillmentError::InvalidQuantity(format!("required quantity must be positive. Got {required_qty}")));
    }
    let nearest = rank_candidate_stores(session, point, product_id, exclude).await?.into_iter().next();
    match &nearest {
        Some(c) => debug!(
            "🏬️ Store {} ({:.1} km away) holds {} of the {required_qty} units of product {product_id} needed",
            c.store.id, c.distance_km, c.stock
        ),
        None => debug!("🏬️ No store near {point} holds product {product_id}"),
    }
    Ok(nearest)
}

pub struct StoreLocator<B> {
    db: B,
}

impl<B> Debug for StoreLocator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreLocator")
    }
}

impl<B> StoreLocator<B>
where B: FulfillmentDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn find_alternate_store(
        &self,
        point: &GeoPoint,
        product_id: ProductId,
        required_qty: Quantity,
        exclude: Option<StoreId>,
    ) -> Result<Option<StoreCandidate>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let result = find_alternate_store(&mut session, point, product_id, required_qty, exclude).await?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(result)
    }

    pub async fn rank_candidate_stores(
        &self,
        point: &GeoPoint,
        product_id: ProductId,
        exclude: Option<StoreId>,
    ) -> Result<Vec<StoreCandidate>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let result = rank_candidate_stores(&mut session, point, product_id, exclude).await?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(result)
    }

    pub async fn stores(&self) -> Result<Vec<Store>, FulfillmentError> {
        let mut session = self.db.begin().await.map_err(FulfillmentError::database)?;
        let result = session.fetch_stores().await.map_err(FulfillmentError::database)?;
        session.rollback().await.map_err(FulfillmentError::database)?;
        Ok(result)
    }
}
