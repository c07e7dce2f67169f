pub mod fulfillment_world;
pub mod setups;
pub mod steps;

pub use fulfillment_world::FulfillmentWorld;
