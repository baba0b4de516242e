//! # pricing-engine
//!
//! Cost propagation and tiered sale-price engine for formulated products.
//!
//! Products either carry a typed-in base cost or derive their cost from a
//! weighted formula of other products. The engine resolves those costs over
//! the ingredient graph, keeps them current as base costs and formulas
//! change, and turns them into sale prices through margin markup, a
//! quantity-tiered coefficient matrix, per-client overrides and mandated
//! rounding.
//!
//! ## Architecture
//!
//! - **core**: Foundational types: products, formulas, rates, overrides, rounding, errors
//! - **catalog**: Catalog and override stores, atomic change sets, JSON snapshots
//! - **graph**: Ingredient graph, cycle-safe cost resolution, cost propagation
//! - **pricing**: Tier matrices, special client pricing, the price calculator
//! - **simulation**: Random catalog generation for tests and benchmarks

pub mod catalog;
pub mod core;
pub mod graph;
pub mod pricing;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::catalog::client_pricing::{ClientPricingStore, InMemoryClientPricing};
    pub use crate::catalog::product_catalog::{CatalogWriter, InMemoryCatalog, ProductCatalog};
    pub use crate::catalog::snapshot::LoadedCatalog;
    pub use crate::core::client::{ClientId, ClientPriceOverride, OverrideRule};
    pub use crate::core::error::PricingError;
    pub use crate::core::exchange_rate::{ExchangeRateProvider, ExchangeRateTable};
    pub use crate::core::formula::{Formula, FormulaItem};
    pub use crate::core::product::{CostSource, Product, ProductId, RateName};
    pub use crate::core::rounding::{RoundingIncrement, RoundingPolicy};
    pub use crate::graph::cost_resolver::CostResolver;
    pub use crate::graph::propagation::{CostPropagator, PropagationReport};
    pub use crate::pricing::calculator::{PriceCalculator, PriceQuote, PriceRequest, PricingContext};
    pub use crate::pricing::tier_matrix::{TierMatrix, TierMatrixSet};
}
