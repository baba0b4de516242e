//! Random catalog generation for tests and benchmarks.
//!
//! Catalogs are layered: raw materials form layer 0, and every formula in
//! layer `k` only uses products from layers below `k`. Generated catalogs
//! are therefore always acyclic.

use crate::catalog::snapshot::{CatalogSnapshot, MatrixSource};
use crate::core::formula::{FormulaInput, FormulaItem};
use crate::core::product::{Product, ProductId, RateName};
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Calculation type of every generated product.
pub const GENERATED_CALCULATION_TYPE: &str = "GENERATED";

const GENERATED_MATRIX: &str = "\
,,1,5,10,50
ref,label,1,5,10,50
0,low,0.95,0.90,0.85,0.80
100,high,0.93,0.88,0.83,0.78
";

/// Configuration for generating a random catalog.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Number of base-cost products.
    pub raw_materials: usize,
    /// Number of formula layers stacked on top of the raw materials.
    pub formula_layers: usize,
    pub products_per_layer: usize,
    /// Upper bound; fewer are used when fewer products exist below.
    pub ingredients_per_formula: usize,
    /// Minimum raw material cost.
    pub min_cost: Decimal,
    /// Maximum raw material cost.
    pub max_cost: Decimal,
    pub official_rate: Decimal,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            raw_materials: 20,
            formula_layers: 3,
            products_per_layer: 10,
            ingredients_per_formula: 4,
            min_cost: Decimal::ONE,
            max_cost: Decimal::from(50),
            official_rate: Decimal::from(1_000),
        }
    }
}

/// Generate a random layered catalog.
pub fn generate_random_catalog(config: &CatalogConfig) -> CatalogSnapshot {
    generate_catalog_with_rng(config, &mut rand::thread_rng())
}

/// Same as [`generate_random_catalog`], driven by the caller's RNG so the
/// result can be reproduced from a seed.
pub fn generate_catalog_with_rng<R: Rng + ?Sized>(
    config: &CatalogConfig,
    rng: &mut R,
) -> CatalogSnapshot {
    let min_cents = to_cents(config.min_cost).max(0);
    let max_cents = to_cents(config.max_cost).max(min_cents);

    let mut snapshot = CatalogSnapshot::default();
    let mut pool: Vec<ProductId> = Vec::new();

    for i in 0..config.raw_materials {
        let cost = Decimal::new(rng.gen_range(min_cents..=max_cents), 2);
        let product = Product::base_cost(
            format!("RAW-{:04}", i),
            cost,
            GENERATED_CALCULATION_TYPE,
            reference_value(rng),
            margin(rng),
        );
        pool.push(product.id.clone());
        snapshot.products.push(product);
    }

    for layer in 1..=config.formula_layers {
        let mut layer_ids = Vec::with_capacity(config.products_per_layer);
        for i in 0..config.products_per_layer {
            let count = config.ingredients_per_formula.min(pool.len()).min(20);
            if count == 0 {
                break;
            }
            let product = Product::formulated(
                format!("MIX-{}-{:03}", layer, i),
                GENERATED_CALCULATION_TYPE,
                reference_value(rng),
                margin(rng),
            );
            let ingredients: Vec<ProductId> =
                pool.choose_multiple(rng, count).cloned().collect();
            snapshot.formulas.push(FormulaInput {
                product_id: product.id.clone(),
                items: split_percentages(ingredients, rng),
            });
            layer_ids.push(product.id.clone());
            snapshot.products.push(product);
        }
        pool.extend(layer_ids);
    }

    if let Err(e) = snapshot
        .exchange_rates
        .set_rate(RateName::Official, config.official_rate)
    {
        warn!("generated catalog has no official rate: {}", e);
    }
    snapshot.matrices.push(MatrixSource::inline(
        GENERATED_CALCULATION_TYPE,
        GENERATED_MATRIX,
    ));
    snapshot
}

fn to_cents(value: Decimal) -> i64 {
    (value * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0)
}

fn reference_value<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    Decimal::from(rng.gen_range(0..200))
}

fn margin<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    Decimal::new(rng.gen_range(10..=40), 2)
}

/// Random percentages with two decimals that add up to exactly 100. The
/// last item absorbs the rounding remainder.
fn split_percentages<R: Rng + ?Sized>(ingredients: Vec<ProductId>, rng: &mut R) -> Vec<FormulaItem> {
    let weights: Vec<u32> = ingredients.iter().map(|_| rng.gen_range(1..=10)).collect();
    let total: u32 = weights.iter().sum();
    let last = ingredients.len().saturating_sub(1);

    let mut assigned = Decimal::ZERO;
    ingredients
        .into_iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (ingredient, weight))| {
            let percentage = if i == last {
                Decimal::ONE_HUNDRED - assigned
            } else {
                (Decimal::ONE_HUNDRED * Decimal::from(weight) / Decimal::from(total)).round_dp(2)
            };
            assigned += percentage;
            FormulaItem::new(ingredient, percentage)
        })
        .collect()
}
