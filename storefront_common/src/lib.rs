//! Value types shared across the storefront crates.
//!
//! * [`Quantity`] is the unit of stock. Every inventory count and every ledger delta is expressed in it.
//! * [`GeoPoint`] is a validated latitude/longitude pair, together with the great-circle distance calculation used to
//!   rank stores against a delivery address.
pub mod geo;
pub mod helpers;
pub mod op;
mod quantity;

pub use geo::{GeoError, GeoPoint, EARTH_RADIUS_KM};
pub use quantity::{Quantity, QuantityConversionError};
