use crate::catalog::product_catalog::ProductCatalog;
use crate::core::error::PricingError;
use crate::core::product::{CostSource, ProductId};
use crate::core::rounding::RoundingPolicy;
use log::debug;
use rust_decimal::Decimal;

/// The chain of formula products currently being expanded.
///
/// Each recursive call extends its parent's path with a new stack-local
/// link instead of mutating a shared set, so sibling branches never see each
/// other's entries and concurrent resolutions share nothing.
#[derive(Debug, Clone, Copy)]
pub enum VisitPath<'a> {
    Root,
    Step {
        id: &'a ProductId,
        parent: &'a VisitPath<'a>,
    },
}

impl<'a> VisitPath<'a> {
    /// A path one step longer than `self`.
    pub fn push<'b>(&'b self, id: &'b ProductId) -> VisitPath<'b> {
        VisitPath::Step { id, parent: self }
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        let mut current = self;
        while let VisitPath::Step { id: step, parent } = current {
            if *step == id {
                return true;
            }
            current = *parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut current = self;
        while let VisitPath::Step { parent, .. } = current {
            len += 1;
            current = *parent;
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, VisitPath::Root)
    }

    /// Ids from the outermost product to the innermost.
    pub fn to_vec(&self) -> Vec<ProductId> {
        let mut ids = Vec::with_capacity(self.len());
        let mut current = self;
        while let VisitPath::Step { id, parent } = current {
            ids.push((*id).clone());
            current = *parent;
        }
        ids.reverse();
        ids
    }
}

/// Derives reference-currency costs over the ingredient graph.
///
/// # Examples
///
/// ```
/// use pricing_engine::catalog::product_catalog::InMemoryCatalog;
/// use pricing_engine::core::formula::{Formula, FormulaItem};
/// use pricing_engine::core::product::{Product, ProductId};
/// use pricing_engine::graph::cost_resolver::CostResolver;
/// use rust_decimal_macros::dec;
///
/// let mut catalog = InMemoryCatalog::new();
/// catalog.insert_product(Product::base_cost("RESIN", dec!(2.00), "LIQUID", dec!(0), dec!(0.2))).unwrap();
/// catalog.insert_product(Product::base_cost("SOLVENT", dec!(1.00), "LIQUID", dec!(0), dec!(0.2))).unwrap();
/// catalog.insert_product(Product::formulated("PAINT", "LIQUID", dec!(0), dec!(0.2))).unwrap();
/// catalog
///     .insert_formula(
///         Formula::new(
///             ProductId::new("PAINT"),
///             vec![FormulaItem::new("RESIN", dec!(60)), FormulaItem::new("SOLVENT", dec!(40))],
///         )
///         .unwrap(),
///     )
///     .unwrap();
///
/// let resolver = CostResolver::new(&catalog);
/// assert_eq!(resolver.resolve_cost(&ProductId::new("PAINT")).unwrap(), dec!(1.60));
/// ```
pub struct CostResolver<'a, C: ProductCatalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: ProductCatalog + ?Sized> CostResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Resolve the cost of a product from scratch.
    pub fn resolve_cost(&self, product_id: &ProductId) -> Result<Decimal, PricingError> {
        self.resolve(product_id, &VisitPath::Root)
    }

    /// Resolve the cost of `product_id` reached through `visiting`.
    ///
    /// Base-cost and manual products return their stored cost. Formula
    /// products sum their ingredients' costs weighted by percentage, rounded
    /// to four fractional digits. Returns `CycleDetected` as soon as a
    /// product reappears on its own path.
    pub fn resolve(
        &self,
        product_id: &ProductId,
        visiting: &VisitPath<'_>,
    ) -> Result<Decimal, PricingError> {
        if visiting.contains(product_id) {
            let mut path = visiting.to_vec();
            path.push(product_id.clone());
            return Err(PricingError::CycleDetected { path });
        }

        let product = self
            .catalog
            .get_product(product_id)
            .ok_or_else(|| PricingError::ProductNotFound(product_id.clone()))?;

        match &product.cost {
            CostSource::BaseCost { reference_cost } => {
                reference_cost.ok_or_else(|| PricingError::MissingBaseCost(product_id.clone()))
            }
            CostSource::ManualOverride { reference_cost } => Ok(*reference_cost),
            CostSource::ComputedFromFormula { .. } => {
                let formula = self
                    .catalog
                    .get_formula(product_id)
                    .ok_or_else(|| PricingError::FormulaMissing(product_id.clone()))?;

                let branch = visiting.push(product_id);
                let mut total = Decimal::ZERO;
                for item in formula.items() {
                    let cost = self.resolve(&item.ingredient, &branch)?;
                    total += cost * item.weight();
                }
                let cost = RoundingPolicy::round_cost(total);
                debug!(
                    "resolved {} = {} from {} ingredient(s) at depth {}",
                    product_id,
                    cost,
                    formula.items().len(),
                    visiting.len()
                );
                Ok(cost)
            }
        }
    }
}
