//! Basic price quoting example.
//!
//! Walks one product through the pricing pipeline: standard tiered price,
//! sub-unit purchase, frozen unit price and both kinds of client override.

use pricing_engine::catalog::client_pricing::InMemoryClientPricing;
use pricing_engine::catalog::product_catalog::InMemoryCatalog;
use pricing_engine::core::client::ClientPriceOverride;
use pricing_engine::core::exchange_rate::ExchangeRateTable;
use pricing_engine::core::product::{Product, RateName};
use pricing_engine::pricing::calculator::{PriceCalculator, PriceRequest, PricingContext};
use pricing_engine::pricing::tier_matrix::TierMatrixSet;
use rust_decimal_macros::dec;

const LIQUID: &str = "\
,,1,5,10,50
ref,label,1 kg,5 kg,10 kg,50 kg
0,standard,\"0,95\",\"0,90\",\"0,85\",\"0,80\"
";

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  pricing-engine: Basic Pricing Example   ║");
    println!("╚══════════════════════════════════════════╝\n");

    let mut catalog = InMemoryCatalog::new();
    catalog
        .insert_product(
            Product::base_cost("P", dec!(2.00), "LIQUID", dec!(0), dec!(0.20))
                .with_name("Industrial degreaser"),
        )
        .expect("fresh catalog");

    let mut matrices = TierMatrixSet::new();
    matrices.load("LIQUID".into(), LIQUID).expect("valid matrix");

    let rates = ExchangeRateTable::new()
        .with_rate(RateName::Official, dec!(1000))
        .expect("positive rate");

    let mut overrides = InMemoryClientPricing::new();
    overrides
        .upsert(ClientPriceOverride::fixed("FIXED-CO".into(), "P".into(), dec!(1800)))
        .expect("valid override");
    overrides
        .upsert(ClientPriceOverride::margin("MARGIN-CO".into(), "P".into(), dec!(0.10)))
        .expect("valid override");

    let calculator = PriceCalculator::new(PricingContext::new(
        &catalog,
        &matrices,
        &rates,
        &overrides,
    ));

    let scenarios = [
        ("Standard price, 5 kg", PriceRequest::new("P", dec!(5))),
        ("Sub-unit purchase, 0.5 kg", PriceRequest::new("P", dec!(0.5))),
        (
            "Frozen at the 1 kg price, 12 kg",
            PriceRequest::new("P", dec!(12)).freeze_unit_price(),
        ),
        (
            "Fixed client price, 7 kg",
            PriceRequest::new("P", dec!(7)).for_client("FIXED-CO"),
        ),
        (
            "Client margin override, 12 kg",
            PriceRequest::new("P", dec!(12)).for_client("MARGIN-CO"),
        ),
    ];

    for (title, request) in scenarios {
        println!("━━━ {} ━━━\n", title);
        match calculator.calculate_price(&request) {
            Ok(quote) => {
                println!("{}", quote);
                println!("  Markup over local cost: {:.3}x\n", quote.breakdown.markup_ratio());
            }
            Err(e) => println!("  Error [{}]: {}\n", e.code(), e),
        }
    }
}
