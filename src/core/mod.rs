pub mod client;
pub mod error;
pub mod exchange_rate;
pub mod formula;
pub mod product;
pub mod rounding;
