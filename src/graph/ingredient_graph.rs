use crate::catalog::product_catalog::ProductCatalog;
use crate::core::product::ProductId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed "is-ingredient-of" graph over the catalog.
///
/// An edge `ingredient -> owner` exists for every formula item, weighted
/// by the item percentage. Walking outgoing edges from a product therefore
/// visits everything whose cost depends on it.
///
/// # Examples
///
/// ```
/// use pricing_engine::catalog::product_catalog::InMemoryCatalog;
/// use pricing_engine::core::formula::{Formula, FormulaItem};
/// use pricing_engine::core::product::{Product, ProductId};
/// use pricing_engine::graph::ingredient_graph::IngredientGraph;
/// use rust_decimal_macros::dec;
///
/// let mut catalog = InMemoryCatalog::new();
/// catalog.insert_product(Product::base_cost("RESIN", dec!(2), "LIQUID", dec!(0), dec!(0.2))).unwrap();
/// catalog.insert_product(Product::formulated("PAINT", "LIQUID", dec!(0), dec!(0.2))).unwrap();
/// catalog
///     .insert_formula(Formula::new(ProductId::new("PAINT"), vec![FormulaItem::new("RESIN", dec!(100))]).unwrap())
///     .unwrap();
///
/// let graph = IngredientGraph::from_catalog(&catalog);
/// assert_eq!(graph.direct_dependents(&ProductId::new("RESIN")), vec![ProductId::new("PAINT")]);
/// ```
#[derive(Debug, Clone)]
pub struct IngredientGraph {
    graph: DiGraph<ProductId, Decimal>,
    index: HashMap<ProductId, NodeIndex>,
}

impl IngredientGraph {
    /// Build the graph from every formula in the catalog.
    pub fn from_catalog<C: ProductCatalog + ?Sized>(catalog: &C) -> Self {
        let mut built = Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        };
        for id in catalog.product_ids() {
            let owner = built.node(&id);
            if let Some(formula) = catalog.get_formula(&id) {
                for item in formula.items() {
                    let ingredient = built.node(&item.ingredient);
                    built.graph.add_edge(ingredient, owner, item.percentage);
                }
            }
        }
        built
    }

    fn node(&mut self, id: &ProductId) -> NodeIndex {
        if let Some(&ix) = self.index.get(id) {
            return ix;
        }
        let ix = self.graph.add_node(id.clone());
        self.index.insert(id.clone(), ix);
        ix
    }

    pub fn product_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Products that list `id` directly as an ingredient, sorted.
    pub fn direct_dependents(&self, id: &ProductId) -> Vec<ProductId> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<ProductId> = self
            .graph
            .neighbors_directed(ix, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Breadth-first walk of everything transitively made from `start`.
    ///
    /// Only products accepted by `expand` are collected and walked through;
    /// the walk stops at the others. `start` itself is never returned, even
    /// when a cycle leads back to it. Siblings at each level come out
    /// sorted, so the order is deterministic.
    pub fn transitive_dependents(
        &self,
        start: &ProductId,
        expand: impl Fn(&ProductId) -> bool,
    ) -> Vec<ProductId> {
        let Some(&start_ix) = self.index.get(start) else {
            return Vec::new();
        };

        let mut seen: HashSet<NodeIndex> = HashSet::from([start_ix]);
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([start_ix]);
        let mut order = Vec::new();

        while let Some(current) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| !seen.contains(n))
                .collect();
            next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            next.dedup();

            for n in next {
                seen.insert(n);
                let id = &self.graph[n];
                if expand(id) {
                    order.push(id.clone());
                    queue.push_back(n);
                }
            }
        }
        order
    }

    /// Groups of products whose formulas reach each other, largest first.
    /// An acyclic catalog returns nothing.
    pub fn cycles(&self) -> Vec<Vec<ProductId>> {
        let mut groups: Vec<Vec<ProductId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.contains_edge(n, n))
            })
            .map(|component| {
                let mut ids: Vec<ProductId> =
                    component.into_iter().map(|n| self.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::product_catalog::{CatalogWriter, InMemoryCatalog, StagedCatalog};
    use crate::core::formula::{Formula, FormulaItem};
    use crate::core::product::{CostSource, Product};
    use rust_decimal_macros::dec;

    fn formula(owner: &str, items: &[(&str, Decimal)]) -> Formula {
        Formula::new(
            ProductId::new(owner),
            items
                .iter()
                .map(|(id, pct)| FormulaItem::new(*id, *pct))
                .collect(),
        )
        .unwrap()
    }

    /// RESIN -> BASE -> PAINT, RESIN -> PAINT, SOLVENT -> BASE
    fn layered() -> InMemoryCatalog {
        let mut c = InMemoryCatalog::new();
        for id in ["RESIN", "SOLVENT"] {
            c.insert_product(Product::base_cost(id, dec!(1), "LIQUID", dec!(0), dec!(0.2)))
                .unwrap();
        }
        for id in ["BASE", "PAINT"] {
            c.insert_product(Product::formulated(id, "LIQUID", dec!(0), dec!(0.2)))
                .unwrap();
        }
        c.insert_formula(formula("BASE", &[("RESIN", dec!(50)), ("SOLVENT", dec!(50))]))
            .unwrap();
        c.insert_formula(formula("PAINT", &[("BASE", dec!(80)), ("RESIN", dec!(20))]))
            .unwrap();
        c
    }

    #[test]
    fn test_graph_shape() {
        let g = IngredientGraph::from_catalog(&layered());
        assert_eq!(g.product_count(), 4);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(
            g.direct_dependents(&ProductId::new("RESIN")),
            vec![ProductId::new("BASE"), ProductId::new("PAINT")]
        );
        assert!(g.direct_dependents(&ProductId::new("PAINT")).is_empty());
        assert!(g.direct_dependents(&ProductId::new("GHOST")).is_empty());
    }

    #[test]
    fn test_transitive_dependents_bfs() {
        let g = IngredientGraph::from_catalog(&layered());
        let deps = g.transitive_dependents(&ProductId::new("SOLVENT"), |_| true);
        assert_eq!(deps, vec![ProductId::new("BASE"), ProductId::new("PAINT")]);
        // PAINT is reachable twice from RESIN but listed once
        let deps = g.transitive_dependents(&ProductId::new("RESIN"), |_| true);
        assert_eq!(deps, vec![ProductId::new("BASE"), ProductId::new("PAINT")]);
    }

    #[test]
    fn test_walk_stops_at_rejected_products() {
        let g = IngredientGraph::from_catalog(&layered());
        let deps = g.transitive_dependents(&ProductId::new("SOLVENT"), |id| id.as_str() != "BASE");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_cycles_reported() {
        let base = layered();
        assert!(IngredientGraph::from_catalog(&base).cycles().is_empty());

        // Close a loop BASE -> PAINT -> BASE in a staged view.
        let mut staged = StagedCatalog::new(&base);
        staged.stage_formula(formula("BASE", &[("PAINT", dec!(50)), ("SOLVENT", dec!(50))]));
        let g = IngredientGraph::from_catalog(&staged);
        assert_eq!(
            g.cycles(),
            vec![vec![ProductId::new("BASE"), ProductId::new("PAINT")]]
        );
        // The walk terminates and never returns its start.
        let deps = g.transitive_dependents(&ProductId::new("PAINT"), |_| true);
        assert_eq!(deps, vec![ProductId::new("BASE")]);
    }

    #[test]
    fn test_manual_override_not_expanded_by_caller() {
        let mut c = layered();
        let mut base = c.get_product(&ProductId::new("BASE")).unwrap().clone();
        base.cost = CostSource::ManualOverride {
            reference_cost: dec!(9),
        };
        let mut staged = StagedCatalog::new(&c);
        staged.stage_product(base);
        let changes = staged.into_changes();
        c.apply_changes(changes).unwrap();

        let g = IngredientGraph::from_catalog(&c);
        let deps = g.transitive_dependents(&ProductId::new("SOLVENT"), |id| {
            c.get_product(id).is_some_and(|p| p.cost.is_formula())
        });
        assert!(deps.is_empty());
    }
}
