use pricing_engine::catalog::product_catalog::{InMemoryCatalog, ProductCatalog};
use pricing_engine::core::error::{FormulaError, PricingError};
use pricing_engine::core::formula::{Formula, FormulaItem};
use pricing_engine::core::product::{Product, ProductId};
use pricing_engine::core::rounding::{RoundingIncrement, RoundingPolicy};
use pricing_engine::graph::cost_resolver::CostResolver;
use pricing_engine::graph::propagation::CostPropagator;
use pricing_engine::pricing::tier_matrix::TierMatrix;
use pricing_engine::simulation::catalog_generator::{generate_catalog_with_rng, CatalogConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::path::Path;

/// A positive price with two decimals (0.01 to 1,000,000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// A quantity with up to three decimals (0.001 to 1,000).
fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|millis| Decimal::new(millis, 3))
}

/// A fully populated matrix over random, distinct tiers.
fn arb_matrix() -> impl Strategy<Value = TierMatrix> {
    (
        prop::collection::btree_set(0u32..500, 1..6),
        prop::collection::btree_set(1u32..200, 1..8),
    )
        .prop_map(|(references, quantities)| {
            let mut table = String::from(",");
            for q in &quantities {
                table.push_str(&format!(",{}", q));
            }
            table.push_str("\nref,label\n");
            for r in &references {
                table.push_str(&format!("{},row", r));
                for _ in &quantities {
                    table.push_str(",0.9");
                }
                table.push('\n');
            }
            TierMatrix::parse("PROP".into(), &table).unwrap()
        })
}

/// A layered catalog reproducible from its seed.
fn seeded_catalog(seed: u64) -> InMemoryCatalog {
    let config = CatalogConfig {
        raw_materials: 10,
        formula_layers: 3,
        products_per_layer: 6,
        ingredients_per_formula: 4,
        ..Default::default()
    };
    generate_catalog_with_rng(&config, &mut StdRng::seed_from_u64(seed))
        .build(Path::new("."))
        .unwrap()
        .catalog
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Rounding up never lowers a price and never adds a
    // full increment.
    // ===================================================================
    #[test]
    fn round_up_bounds(x in arb_amount()) {
        let ten = RoundingPolicy::round_up(x, RoundingIncrement::Ten);
        prop_assert!(ten >= x);
        prop_assert!(ten - x < Decimal::TEN);
        prop_assert_eq!(ten % Decimal::TEN, Decimal::ZERO);

        let hundred = RoundingPolicy::round_up(x, RoundingIncrement::Hundred);
        prop_assert!(hundred >= x);
        prop_assert!(hundred - x < Decimal::ONE_HUNDRED);
        prop_assert_eq!(hundred.scale(), 2);
    }

    // ===================================================================
    // INVARIANT 2: Lookup is monotonic in quantity.
    //
    // With the reference value fixed, buying more never selects a lower
    // quantity tier.
    // ===================================================================
    #[test]
    fn lookup_monotonic_in_quantity(
        matrix in arb_matrix(),
        reference in 0u32..600,
        a in arb_quantity(),
        b in arb_quantity(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let reference = Decimal::from(reference);
        let low_hit = matrix.lookup(reference, low).unwrap();
        let high_hit = matrix.lookup(reference, high).unwrap();
        prop_assert!(low_hit.quantity_index <= high_hit.quantity_index);
        prop_assert!(low_hit.quantity_tier_used <= high_hit.quantity_tier_used);
        prop_assert_eq!(low_hit.reference_index, high_hit.reference_index);
    }

    // ===================================================================
    // INVARIANT 3: Resolution is idempotent.
    //
    // Resolving the same product twice without intervening edits yields
    // the same cost, and a full refresh then changes nothing.
    // ===================================================================
    #[test]
    fn resolve_is_idempotent(seed in any::<u64>()) {
        let mut catalog = seeded_catalog(seed);
        let ids = catalog.product_ids();
        let first: Vec<Decimal> = {
            let resolver = CostResolver::new(&catalog);
            ids.iter().map(|id| resolver.resolve_cost(id).unwrap()).collect()
        };
        let second: Vec<Decimal> = {
            let resolver = CostResolver::new(&catalog);
            ids.iter().map(|id| resolver.resolve_cost(id).unwrap()).collect()
        };
        prop_assert_eq!(&first, &second);

        CostPropagator::refresh_all(&mut catalog).unwrap();
        let again = CostPropagator::refresh_all(&mut catalog).unwrap();
        prop_assert!(again.changes.is_empty());
        prop_assert!(again.is_clean());
    }

    // ===================================================================
    // INVARIANT 4: Mutual references are always detected.
    //
    // Closing a loop between any two formula products makes both
    // unresolvable with CycleDetected instead of recursing forever.
    // ===================================================================
    #[test]
    fn two_cycles_always_detected(seed in any::<u64>(), pick in any::<prop::sample::Index>()) {
        let mut catalog = seeded_catalog(seed);
        let formulas: Vec<ProductId> = catalog
            .product_ids()
            .into_iter()
            .filter(|id| catalog.get_formula(id).is_some())
            .collect();
        let target = pick.get(&formulas).clone();

        let loop_a = ProductId::new("LOOP-A");
        catalog
            .insert_product(Product::formulated(loop_a.clone(), "GENERATED", Decimal::ZERO, Decimal::ZERO))
            .unwrap();
        catalog
            .insert_formula(Formula::new(loop_a.clone(), vec![FormulaItem::new(&target, Decimal::ONE_HUNDRED)]).unwrap())
            .unwrap();

        let report = CostPropagator::replace_formula(
            &mut catalog,
            &target,
            vec![FormulaItem::new(&loop_a, Decimal::ONE_HUNDRED)],
        )
        .unwrap();
        prop_assert_eq!(
            report.failure_for(&target).map(|e| e.code()),
            Some("CYCLE_DETECTED")
        );

        let resolver = CostResolver::new(&catalog);
        let is_cycle = matches!(
            resolver.resolve_cost(&loop_a),
            Err(PricingError::CycleDetected { .. })
        );
        prop_assert!(is_cycle);
    }

    // ===================================================================
    // INVARIANT 5: Formulas exist only when percentages sum to 100.
    // ===================================================================
    #[test]
    fn formula_sum_validated(parts in prop::collection::vec(1i64..10_000i64, 1..8)) {
        let items: Vec<FormulaItem> = parts
            .iter()
            .enumerate()
            .map(|(i, basis)| FormulaItem::new(format!("ING-{}", i), Decimal::new(*basis, 2)))
            .collect();
        let total: Decimal = items.iter().map(|item| item.percentage).sum();

        match Formula::new(ProductId::new("OWNER"), items) {
            Ok(formula) => {
                prop_assert!((formula.total_percentage() - Decimal::ONE_HUNDRED).abs() <= Decimal::new(1, 2));
            }
            Err(FormulaError::PercentageSum { total: reported, .. }) => {
                prop_assert_eq!(reported, total);
                prop_assert!((total - Decimal::ONE_HUNDRED).abs() > Decimal::new(1, 2));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
