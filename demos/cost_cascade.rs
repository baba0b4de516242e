//! Cost propagation example.
//!
//! Builds a three-level formulation, edits a raw material cost and shows
//! how the change ripples up, then closes an ingredient loop to show how
//! cycles are reported.

use pricing_engine::catalog::product_catalog::{InMemoryCatalog, ProductCatalog};
use pricing_engine::core::formula::FormulaItem;
use pricing_engine::core::product::{Product, ProductId};
use pricing_engine::graph::ingredient_graph::IngredientGraph;
use pricing_engine::graph::propagation::CostPropagator;
use rust_decimal_macros::dec;

fn print_costs(catalog: &InMemoryCatalog) {
    for id in catalog.product_ids() {
        if let Some(product) = catalog.get_product(&id) {
            let cost = product
                .stored_cost()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<10} {:>10}", id.as_str(), cost);
        }
    }
    println!();
}

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  pricing-engine: Cost Cascade Example    ║");
    println!("╚══════════════════════════════════════════╝\n");

    let mut catalog = InMemoryCatalog::new();
    for (id, cost) in [("RESIN", dec!(2.40)), ("SOLVENT", dec!(0.90)), ("PIGMENT", dec!(6.10))] {
        catalog
            .insert_product(Product::base_cost(id, cost, "LIQUID", dec!(0), dec!(0.25)))
            .expect("fresh catalog");
    }

    let formulas = [
        ("BINDER", vec![("RESIN", dec!(70)), ("SOLVENT", dec!(30))]),
        ("BASE", vec![("BINDER", dec!(85)), ("PIGMENT", dec!(15))]),
        ("ENAMEL", vec![("BASE", dec!(90)), ("SOLVENT", dec!(10))]),
    ];
    for (id, items) in formulas {
        CostPropagator::register_product(
            &mut catalog,
            Product::formulated(id, "LIQUID", dec!(0), dec!(0.30)),
            Some(
                items
                    .into_iter()
                    .map(|(ingredient, pct)| FormulaItem::new(ingredient, pct))
                    .collect(),
            ),
        )
        .expect("valid formula");
    }

    println!("━━━ Initial costs ━━━\n");
    print_costs(&catalog);

    println!("━━━ RESIN goes from 2.40 to 3.10 ━━━\n");
    let report = CostPropagator::update_base_cost(&mut catalog, &ProductId::new("RESIN"), dec!(3.10))
        .expect("RESIN is a base-cost product");
    println!("{}", report);
    print_costs(&catalog);

    println!("━━━ BINDER now uses ENAMEL (a loop) ━━━\n");
    let report = CostPropagator::replace_formula(
        &mut catalog,
        &ProductId::new("BINDER"),
        vec![
            FormulaItem::new("ENAMEL", dec!(50)),
            FormulaItem::new("RESIN", dec!(50)),
        ],
    )
    .expect("formula is well-formed");
    println!("{}", report);

    for group in IngredientGraph::from_catalog(&catalog).cycles() {
        let ids: Vec<&str> = group.iter().map(|id| id.as_str()).collect();
        println!("  Cycle: {}", ids.join(", "));
    }

    println!("\n━━━ Interpretation ━━━\n");
    println!("  Products caught in the loop keep their last good cost and are");
    println!("  reported as failures until the formula is fixed.");
}
