use crate::core::error::CatalogError;
use crate::core::formula::Formula;
use crate::core::product::{CostSource, Product, ProductId};
use chrono::Utc;
use log::info;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Read access to products and their formulas.
///
/// Implementations hand out already-fetched data; the engine never suspends
/// or retries through this trait.
pub trait ProductCatalog: Send + Sync {
    fn get_product(&self, id: &ProductId) -> Option<&Product>;

    /// The formula owned by `product_id`, if it has one.
    fn get_formula(&self, product_id: &ProductId) -> Option<&Formula>;

    /// Every known product id, sorted.
    fn product_ids(&self) -> Vec<ProductId>;
}

/// A batch of catalog writes committed as one unit.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Products to insert or overwrite.
    pub products: Vec<Product>,
    /// Formulas to insert or replace (keyed by their owner).
    pub formulas: Vec<Formula>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.formulas.is_empty()
    }
}

/// Atomic write access to a catalog.
pub trait CatalogWriter {
    /// Apply every change or none of them. Implementations must validate
    /// the whole set before mutating anything.
    fn apply_changes(&mut self, changes: ChangeSet) -> Result<(), CatalogError>;
}

/// Catalog held entirely in memory.
///
/// # Examples
///
/// ```
/// use pricing_engine::catalog::product_catalog::{InMemoryCatalog, ProductCatalog};
/// use pricing_engine::core::product::{Product, ProductId};
/// use rust_decimal_macros::dec;
///
/// let mut catalog = InMemoryCatalog::new();
/// catalog
///     .insert_product(Product::base_cost("RESIN", dec!(2), "LIQUID", dec!(10), dec!(0.2)))
///     .unwrap();
///
/// assert!(catalog.get_product(&ProductId::new("RESIN")).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: HashMap<ProductId, Product>,
    formulas: HashMap<ProductId, Formula>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new product. Fails if the id is taken.
    pub fn insert_product(&mut self, product: Product) -> Result<(), CatalogError> {
        if self.products.contains_key(&product.id) {
            return Err(CatalogError::DuplicateProduct(product.id));
        }
        self.products.insert(product.id.clone(), product);
        Ok(())
    }

    /// Attach a formula to an existing, non-base-cost product. Every
    /// ingredient must already be in the catalog.
    pub fn insert_formula(&mut self, formula: Formula) -> Result<(), CatalogError> {
        check_formula(&formula, |id| self.products.get(id))?;
        self.formulas.insert(formula.product_id().clone(), formula);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn get_product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    fn get_formula(&self, product_id: &ProductId) -> Option<&Formula> {
        self.formulas.get(product_id)
    }

    fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.products.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl CatalogWriter for InMemoryCatalog {
    fn apply_changes(&mut self, changes: ChangeSet) -> Result<(), CatalogError> {
        if changes.is_empty() {
            return Ok(());
        }

        // Validate against the catalog as it will look after the commit.
        let incoming: HashMap<&ProductId, &Product> =
            changes.products.iter().map(|p| (&p.id, p)).collect();
        let lookup = |id: &ProductId| incoming.get(id).copied().or_else(|| self.products.get(id));
        for formula in &changes.formulas {
            check_formula(formula, lookup)?;
        }
        for product in &changes.products {
            let keeps_formula = self.formulas.contains_key(&product.id)
                || changes.formulas.iter().any(|f| f.product_id() == &product.id);
            if keeps_formula && product.cost.is_base_cost() {
                return Err(CatalogError::NotAFormulaProduct(product.id.clone()));
            }
        }

        let product_count = changes.products.len();
        let formula_count = changes.formulas.len();
        for product in changes.products {
            self.products.insert(product.id.clone(), product);
        }
        for formula in changes.formulas {
            self.formulas.insert(formula.product_id().clone(), formula);
        }
        info!(
            "committed {} product(s) and {} formula(s)",
            product_count, formula_count
        );
        Ok(())
    }
}

fn check_formula<'a>(
    formula: &Formula,
    lookup: impl Fn(&ProductId) -> Option<&'a Product>,
) -> Result<(), CatalogError> {
    let owner = formula.product_id();
    let product = lookup(owner).ok_or_else(|| CatalogError::UnknownProduct(owner.clone()))?;
    if product.cost.is_base_cost() {
        return Err(CatalogError::NotAFormulaProduct(owner.clone()));
    }
    for ingredient in formula.ingredients() {
        if lookup(ingredient).is_none() {
            return Err(CatalogError::UnknownIngredient {
                owner: owner.clone(),
                ingredient: ingredient.clone(),
            });
        }
    }
    Ok(())
}

/// Uncommitted edits layered over a base catalog.
///
/// Reads see staged products and formulas first, so a cost cascade can be
/// computed against the catalog as it would look after the edit. Nothing
/// reaches the base until [`into_changes`](Self::into_changes) is applied
/// through a [`CatalogWriter`].
pub struct StagedCatalog<'a, C: ProductCatalog + ?Sized> {
    base: &'a C,
    products: HashMap<ProductId, Product>,
    formulas: HashMap<ProductId, Formula>,
}

impl<'a, C: ProductCatalog + ?Sized> StagedCatalog<'a, C> {
    pub fn new(base: &'a C) -> Self {
        Self {
            base,
            products: HashMap::new(),
            formulas: HashMap::new(),
        }
    }

    pub fn stage_product(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn stage_formula(&mut self, formula: Formula) {
        self.formulas.insert(formula.product_id().clone(), formula);
    }

    /// Stage a new stored cost for a formula product, stamping the time.
    /// Products without a formula cost source are left alone.
    pub fn stage_computed_cost(&mut self, id: &ProductId, cost: Decimal) -> bool {
        let Some(mut product) = self.get_product(id).cloned() else {
            return false;
        };
        if !product.cost.is_formula() {
            return false;
        }
        product.cost = CostSource::ComputedFromFormula {
            last_computed: Some(cost),
        };
        product.cost_updated_at = Some(Utc::now());
        self.stage_product(product);
        true
    }

    pub fn is_staged(&self, id: &ProductId) -> bool {
        self.products.contains_key(id) || self.formulas.contains_key(id)
    }

    pub fn into_changes(self) -> ChangeSet {
        let mut products: Vec<Product> = self.products.into_values().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        let mut formulas: Vec<Formula> = self.formulas.into_values().collect();
        formulas.sort_by(|a, b| a.product_id().cmp(b.product_id()));
        ChangeSet { products, formulas }
    }
}

impl<C: ProductCatalog + ?Sized> ProductCatalog for StagedCatalog<'_, C> {
    fn get_product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id).or_else(|| self.base.get_product(id))
    }

    fn get_formula(&self, product_id: &ProductId) -> Option<&Formula> {
        self.formulas
            .get(product_id)
            .or_else(|| self.base.get_formula(product_id))
    }

    fn product_ids(&self) -> Vec<ProductId> {
        let ids: BTreeSet<ProductId> = self
            .base
            .product_ids()
            .into_iter()
            .chain(self.products.keys().cloned())
            .collect();
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formula::FormulaItem;
    use rust_decimal_macros::dec;

    fn catalog() -> InMemoryCatalog {
        let mut c = InMemoryCatalog::new();
        c.insert_product(Product::base_cost("RESIN", dec!(2), "LIQUID", dec!(10), dec!(0.2)))
            .unwrap();
        c.insert_product(Product::base_cost("SOLVENT", dec!(1), "LIQUID", dec!(10), dec!(0.2)))
            .unwrap();
        c.insert_product(Product::formulated("PAINT", "LIQUID", dec!(10), dec!(0.3)))
            .unwrap();
        c
    }

    fn paint_formula() -> Formula {
        Formula::new(
            ProductId::new("PAINT"),
            vec![
                FormulaItem::new("RESIN", dec!(60)),
                FormulaItem::new("SOLVENT", dec!(40)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let mut c = catalog();
        let err = c
            .insert_product(Product::base_cost("RESIN", dec!(9), "LIQUID", dec!(10), dec!(0.2)))
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateProduct(ProductId::new("RESIN")));
    }

    #[test]
    fn test_insert_formula_checks_ingredients() {
        let mut c = catalog();
        c.insert_formula(paint_formula()).unwrap();
        assert_eq!(c.formula_count(), 1);

        let bad = Formula::new(
            ProductId::new("PAINT"),
            vec![FormulaItem::new("GHOST", dec!(100))],
        )
        .unwrap();
        assert_eq!(
            c.insert_formula(bad).unwrap_err(),
            CatalogError::UnknownIngredient {
                owner: ProductId::new("PAINT"),
                ingredient: ProductId::new("GHOST"),
            }
        );
    }

    #[test]
    fn test_base_cost_product_cannot_own_formula() {
        let mut c = catalog();
        let f = Formula::new(
            ProductId::new("RESIN"),
            vec![FormulaItem::new("SOLVENT", dec!(100))],
        )
        .unwrap();
        assert_eq!(
            c.insert_formula(f).unwrap_err(),
            CatalogError::NotAFormulaProduct(ProductId::new("RESIN"))
        );
    }

    #[test]
    fn test_apply_changes_is_all_or_nothing() {
        let mut c = catalog();
        let mut resin = c.get_product(&ProductId::new("RESIN")).unwrap().clone();
        resin.cost = CostSource::BaseCost {
            reference_cost: Some(dec!(5)),
        };
        let bad = Formula::new(
            ProductId::new("PAINT"),
            vec![FormulaItem::new("GHOST", dec!(100))],
        )
        .unwrap();

        let changes = ChangeSet {
            products: vec![resin],
            formulas: vec![bad],
        };
        assert!(c.apply_changes(changes).is_err());
        // The valid product edit in the same batch must not have landed.
        assert_eq!(
            c.get_product(&ProductId::new("RESIN")).unwrap().stored_cost(),
            Some(dec!(2))
        );
    }

    #[test]
    fn test_staged_reads_shadow_base() {
        let mut c = catalog();
        c.insert_formula(paint_formula()).unwrap();

        let mut staged = StagedCatalog::new(&c);
        assert!(staged.stage_computed_cost(&ProductId::new("PAINT"), dec!(1.6)));
        assert!(!staged.stage_computed_cost(&ProductId::new("RESIN"), dec!(1.6)));
        assert_eq!(
            staged.get_product(&ProductId::new("PAINT")).unwrap().stored_cost(),
            Some(dec!(1.6))
        );
        assert_eq!(
            c.get_product(&ProductId::new("PAINT")).unwrap().stored_cost(),
            None
        );

        let changes = staged.into_changes();
        assert_eq!(changes.products.len(), 1);
        c.apply_changes(changes).unwrap();
        let paint = c.get_product(&ProductId::new("PAINT")).unwrap();
        assert_eq!(paint.stored_cost(), Some(dec!(1.6)));
        assert!(paint.cost_updated_at.is_some());
    }
}
