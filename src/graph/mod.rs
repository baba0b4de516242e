pub mod cost_resolver;
pub mod ingredient_graph;
pub mod propagation;
