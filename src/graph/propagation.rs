//! Cascading cost recomputation after catalog edits.
//!
//! Every edit is staged in a [`StagedCatalog`], the affected formula
//! products are recomputed against that staged view, and the edit plus all
//! changed costs are handed to [`CatalogWriter::apply_changes`] in a single
//! call. Readers of the catalog see either the old graph or the fully
//! propagated one.

use crate::catalog::product_catalog::{CatalogWriter, ProductCatalog, StagedCatalog};
use crate::core::error::{CatalogError, FormulaError, PricingError};
use crate::core::formula::{Formula, FormulaItem};
use crate::core::product::{CostSource, Product, ProductId};
use crate::graph::cost_resolver::CostResolver;
use crate::graph::ingredient_graph::IngredientGraph;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Edits rejected before any cost was recomputed.
#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("product {0} does not take its cost from a base cost")]
    NotBaseCost(ProductId),

    #[error("base cost of {product_id} must not be negative, got {cost}")]
    NegativeCost { product_id: ProductId, cost: Decimal },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// A stored cost that moved during propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostChange {
    pub product_id: ProductId,
    pub previous: Option<Decimal>,
    pub current: Decimal,
}

/// A product whose cost could not be recomputed. Its stored cost is left
/// as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationFailure {
    pub product_id: ProductId,
    #[serde(serialize_with = "serialize_error")]
    pub error: PricingError,
}

fn serialize_error<S: Serializer>(error: &PricingError, serializer: S) -> Result<S::Ok, S::Error> {
    error.report().serialize(serializer)
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationReport {
    pub run_id: Uuid,
    /// The product whose edit started the pass; `None` for a full refresh.
    pub trigger: Option<ProductId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every formula product recomputed, in breadth-first order.
    pub affected: Vec<ProductId>,
    pub changes: Vec<CostChange>,
    pub unchanged: Vec<ProductId>,
    pub failures: Vec<PropagationFailure>,
}

impl PropagationReport {
    fn start(trigger: Option<ProductId>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            started_at: now,
            finished_at: now,
            affected: Vec::new(),
            changes: Vec::new(),
            unchanged: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when every affected product was recomputed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn change_for(&self, product_id: &ProductId) -> Option<&CostChange> {
        self.changes.iter().find(|c| &c.product_id == product_id)
    }

    pub fn failure_for(&self, product_id: &ProductId) -> Option<&PricingError> {
        self.failures
            .iter()
            .find(|f| &f.product_id == product_id)
            .map(|f| &f.error)
    }
}

impl std::fmt::Display for PropagationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cost Propagation {} ===", self.run_id)?;
        match &self.trigger {
            Some(trigger) => writeln!(f, "Trigger:    {}", trigger)?,
            None => writeln!(f, "Trigger:    full refresh")?,
        }
        writeln!(f, "Affected:   {}", self.affected.len())?;
        writeln!(f, "Changed:    {}", self.changes.len())?;
        writeln!(f, "Unchanged:  {}", self.unchanged.len())?;
        writeln!(f, "Failed:     {}", self.failures.len())?;

        for change in &self.changes {
            let previous = change
                .previous
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(f, "  {}: {} -> {}", change.product_id, previous, change.current)?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  {}: {} ({})",
                failure.product_id,
                failure.error,
                failure.error.code()
            )?;
        }
        Ok(())
    }
}

/// Applies cost-affecting edits and propagates them through the catalog.
pub struct CostPropagator;

impl CostPropagator {
    /// Set a new base cost and recompute everything made from the product.
    pub fn update_base_cost<C>(
        catalog: &mut C,
        product_id: &ProductId,
        cost: Decimal,
    ) -> Result<PropagationReport, PropagationError>
    where
        C: ProductCatalog + CatalogWriter,
    {
        if cost < Decimal::ZERO {
            return Err(PropagationError::NegativeCost {
                product_id: product_id.clone(),
                cost,
            });
        }
        let mut product = catalog
            .get_product(product_id)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProduct(product_id.clone()))?;
        if !product.cost.is_base_cost() {
            return Err(PropagationError::NotBaseCost(product_id.clone()));
        }
        product.cost = CostSource::BaseCost {
            reference_cost: Some(cost),
        };
        product.cost_updated_at = Some(Utc::now());

        let (report, changes) = {
            let mut staged = StagedCatalog::new(&*catalog);
            staged.stage_product(product);
            let report = Self::cascade(&mut staged, product_id, false);
            (report, staged.into_changes())
        };
        catalog.apply_changes(changes)?;
        info!(
            "base cost of {} set to {}: {} changed, {} failed",
            product_id,
            cost,
            report.changes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Replace the formula of `owner` and recompute it and its dependents.
    pub fn replace_formula<C>(
        catalog: &mut C,
        owner: &ProductId,
        items: Vec<FormulaItem>,
    ) -> Result<PropagationReport, PropagationError>
    where
        C: ProductCatalog + CatalogWriter,
    {
        let formula = Formula::new(owner.clone(), items)?;
        let product = catalog
            .get_product(owner)
            .ok_or_else(|| CatalogError::UnknownProduct(owner.clone()))?;
        if product.cost.is_base_cost() {
            return Err(CatalogError::NotAFormulaProduct(owner.clone()).into());
        }
        check_ingredients(&*catalog, &formula)?;

        let (report, changes) = {
            let mut staged = StagedCatalog::new(&*catalog);
            staged.stage_formula(formula);
            let report = Self::cascade(&mut staged, owner, true);
            (report, staged.into_changes())
        };
        catalog.apply_changes(changes)?;
        info!(
            "formula of {} replaced: {} changed, {} failed",
            owner,
            report.changes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Save a new product (and its formula, if it has one) and compute its
    /// initial cost.
    pub fn register_product<C>(
        catalog: &mut C,
        product: Product,
        items: Option<Vec<FormulaItem>>,
    ) -> Result<PropagationReport, PropagationError>
    where
        C: ProductCatalog + CatalogWriter,
    {
        if catalog.get_product(&product.id).is_some() {
            return Err(CatalogError::DuplicateProduct(product.id).into());
        }
        let id = product.id.clone();
        let formula = match items {
            Some(items) => {
                if product.cost.is_base_cost() {
                    return Err(CatalogError::NotAFormulaProduct(id).into());
                }
                let formula = Formula::new(id.clone(), items)?;
                check_ingredients(&*catalog, &formula)?;
                Some(formula)
            }
            None => None,
        };

        let (report, changes) = {
            let mut staged = StagedCatalog::new(&*catalog);
            staged.stage_product(product);
            if let Some(formula) = formula {
                staged.stage_formula(formula);
            }
            let report = Self::cascade(&mut staged, &id, true);
            (report, staged.into_changes())
        };
        catalog.apply_changes(changes)?;
        info!("registered product {}", id);
        Ok(report)
    }

    /// Recompute every formula product in the catalog, e.g. after a bulk
    /// import. The report has no trigger.
    pub fn refresh_all<C>(catalog: &mut C) -> Result<PropagationReport, PropagationError>
    where
        C: ProductCatalog + CatalogWriter,
    {
        let ids = catalog.product_ids();
        let targets: Vec<ProductId> = ids
            .iter()
            .filter(|id| {
                catalog
                    .get_product(id)
                    .is_some_and(|p| p.cost.is_formula())
            })
            .cloned()
            .collect();

        let (report, changes) = {
            let mut staged = StagedCatalog::new(&*catalog);
            let mut report = PropagationReport::start(None);
            Self::recompute(&mut staged, targets, &mut report);
            (report, staged.into_changes())
        };
        catalog.apply_changes(changes)?;
        Ok(report)
    }

    /// Collect the affected formula products reachable from `trigger` and
    /// recompute them against the staged view.
    fn cascade<C: ProductCatalog + ?Sized>(
        staged: &mut StagedCatalog<'_, C>,
        trigger: &ProductId,
        include_trigger: bool,
    ) -> PropagationReport {
        let mut report = PropagationReport::start(Some(trigger.clone()));

        let targets = {
            let view: &StagedCatalog<'_, C> = staged;
            let is_formula =
                |id: &ProductId| view.get_product(id).is_some_and(|p| p.cost.is_formula());
            let graph = IngredientGraph::from_catalog(view);
            let mut targets = Vec::new();
            if include_trigger && is_formula(trigger) {
                targets.push(trigger.clone());
            }
            targets.extend(graph.transitive_dependents(trigger, is_formula));
            targets
        };

        Self::recompute(staged, targets, &mut report);
        report
    }

    fn recompute<C: ProductCatalog + ?Sized>(
        staged: &mut StagedCatalog<'_, C>,
        targets: Vec<ProductId>,
        report: &mut PropagationReport,
    ) {
        let results: Vec<(ProductId, Result<Decimal, PricingError>)> = {
            let resolver = CostResolver::new(&*staged);
            targets
                .into_iter()
                .map(|id| {
                    let result = resolver.resolve_cost(&id);
                    (id, result)
                })
                .collect()
        };

        for (product_id, result) in results {
            report.affected.push(product_id.clone());
            match result {
                Ok(cost) => {
                    let previous = staged.get_product(&product_id).and_then(|p| p.stored_cost());
                    if previous == Some(cost) {
                        report.unchanged.push(product_id);
                    } else {
                        staged.stage_computed_cost(&product_id, cost);
                        report.changes.push(CostChange {
                            product_id,
                            previous,
                            current: cost,
                        });
                    }
                }
                Err(error) => {
                    warn!("cost of {} not recomputed: {}", product_id, error);
                    report.failures.push(PropagationFailure { product_id, error });
                }
            }
        }
        report.finished_at = Utc::now();
    }
}

fn check_ingredients<C: ProductCatalog + ?Sized>(
    catalog: &C,
    formula: &Formula,
) -> Result<(), CatalogError> {
    match formula
        .ingredients()
        .find(|id| catalog.get_product(id).is_none())
    {
        Some(missing) => Err(CatalogError::UnknownIngredient {
            owner: formula.product_id().clone(),
            ingredient: missing.clone(),
        }),
        None => Ok(()),
    }
}
