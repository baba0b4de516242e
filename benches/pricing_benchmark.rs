use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pricing_engine::catalog::product_catalog::ProductCatalog;
use pricing_engine::catalog::snapshot::LoadedCatalog;
use pricing_engine::core::product::ProductId;
use pricing_engine::graph::cost_resolver::CostResolver;
use pricing_engine::graph::propagation::CostPropagator;
use pricing_engine::pricing::calculator::{PriceCalculator, PriceRequest};
use pricing_engine::simulation::catalog_generator::{generate_random_catalog, CatalogConfig};
use rust_decimal_macros::dec;
use std::path::Path;

fn load(config: &CatalogConfig) -> LoadedCatalog {
    generate_random_catalog(config)
        .build(Path::new("."))
        .expect("generated catalog is valid")
}

/// The last product generated sits in the top formula layer.
fn top_product(loaded: &LoadedCatalog) -> ProductId {
    loaded
        .catalog
        .product_ids()
        .into_iter()
        .filter(|id| id.as_str().starts_with("MIX-"))
        .max()
        .expect("catalog has formula products")
}

fn bench_resolve_small(c: &mut Criterion) {
    let loaded = load(&CatalogConfig::default());
    let top = top_product(&loaded);
    let resolver = CostResolver::new(&loaded.catalog);

    c.bench_function("resolve_3_layers", |b| {
        b.iter(|| resolver.resolve_cost(black_box(&top)))
    });
}

fn bench_resolve_deep(c: &mut Criterion) {
    let config = CatalogConfig {
        raw_materials: 100,
        formula_layers: 8,
        products_per_layer: 50,
        ingredients_per_formula: 6,
        ..Default::default()
    };
    let loaded = load(&config);
    let top = top_product(&loaded);
    let resolver = CostResolver::new(&loaded.catalog);

    c.bench_function("resolve_8_layers", |b| {
        b.iter(|| resolver.resolve_cost(black_box(&top)))
    });
}

fn bench_price_quote(c: &mut Criterion) {
    let loaded = load(&CatalogConfig::default());
    let top = top_product(&loaded);
    let calculator = PriceCalculator::new(loaded.context());
    let request = PriceRequest::new(top, dec!(12)).freeze_unit_price();

    c.bench_function("price_quote_frozen", |b| {
        b.iter(|| calculator.calculate_price(black_box(&request)))
    });
}

fn bench_propagation(c: &mut Criterion) {
    let config = CatalogConfig {
        raw_materials: 50,
        formula_layers: 5,
        products_per_layer: 40,
        ..Default::default()
    };
    let loaded = load(&config);
    let raw = ProductId::new("RAW-0000");

    c.bench_function("propagate_base_cost_edit", |b| {
        b.iter_batched(
            || loaded.catalog.clone(),
            |mut catalog| CostPropagator::update_base_cost(&mut catalog, &raw, dec!(42.42)),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_resolve_small,
    bench_resolve_deep,
    bench_price_quote,
    bench_propagation
);
criterion_main!(benches);
