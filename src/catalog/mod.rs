pub mod client_pricing;
pub mod product_catalog;
pub mod snapshot;
