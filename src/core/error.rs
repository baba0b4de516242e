use crate::core::client::ClientId;
use crate::core::product::{CalculationType, ProductId, RateName};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors that terminate a cost resolution or price calculation.
///
/// Every variant is surfaced verbatim to the caller; none is ever defaulted
/// to zero. Boundary layers should translate on [`PricingError::code`]
/// rather than on the display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("product {0} is computed from a formula but has none")]
    FormulaMissing(ProductId),

    /// The ingredient graph loops back on itself. `path` runs from the
    /// product being resolved to the repeated product (which appears twice).
    #[error("ingredient cycle detected: {}", format_path(.path))]
    CycleDetected { path: Vec<ProductId> },

    #[error("product {0} has no base cost")]
    MissingBaseCost(ProductId),

    #[error("margin {margin} of product {product_id} is outside [0, 1)")]
    InvalidMargin {
        product_id: ProductId,
        margin: Decimal,
    },

    #[error(
        "no coefficient for calculation type {calculation_type} \
         (reference {reference_value}, quantity {quantity})"
    )]
    CoefficientNotFound {
        calculation_type: CalculationType,
        reference_value: Decimal,
        quantity: Decimal,
    },

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("exchange rate {0} is not configured")]
    RateNotConfigured(RateName),

    #[error("price of {product_id} at quantity {quantity} exceeds the decimal range")]
    Overflow {
        product_id: ProductId,
        quantity: Decimal,
    },
}

impl PricingError {
    /// Stable identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            PricingError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            PricingError::FormulaMissing(_) => "FORMULA_MISSING",
            PricingError::CycleDetected { .. } => "CYCLE_DETECTED",
            PricingError::MissingBaseCost(_) => "MISSING_BASE_COST",
            PricingError::InvalidMargin { .. } => "INVALID_MARGIN",
            PricingError::CoefficientNotFound { .. } => "COEFFICIENT_NOT_FOUND",
            PricingError::InvalidQuantity(_) => "INVALID_QUANTITY",
            PricingError::RateNotConfigured(_) => "RATE_NOT_CONFIGURED",
            PricingError::Overflow { .. } => "OVERFLOW",
        }
    }

    /// Serializable `{ code, message }` view for boundary layers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Wire-friendly rendering of a [`PricingError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
}

fn format_path(path: &[ProductId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Violations of the formula invariants, raised when a formula is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("formula of {0} has no items")]
    Empty(ProductId),

    #[error("formula of {owner}: percentage {percentage} of {ingredient} is outside (0, 100]")]
    InvalidPercentage {
        owner: ProductId,
        ingredient: ProductId,
        percentage: Decimal,
    },

    #[error("formula of {owner}: percentages sum to {total}, expected 100 (±0.01)")]
    PercentageSum { owner: ProductId, total: Decimal },

    #[error("formula of {0} lists the product as its own ingredient")]
    SelfReference(ProductId),

    #[error("formula of {owner} lists {ingredient} more than once")]
    DuplicateIngredient {
        owner: ProductId,
        ingredient: ProductId,
    },
}

/// Rejected catalog mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("formula of {owner} references unknown ingredient {ingredient}")]
    UnknownIngredient {
        owner: ProductId,
        ingredient: ProductId,
    },

    #[error("product {0} takes its cost from a base cost and cannot own a formula")]
    NotAFormulaProduct(ProductId),

    #[error("product {0} already exists")]
    DuplicateProduct(ProductId),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Rejected client override definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    #[error("fixed unit price for client {client_id} on {product_id} must be positive, got {price}")]
    NonPositiveFixedPrice {
        client_id: ClientId,
        product_id: ProductId,
        price: Decimal,
    },

    #[error("margin override for client {client_id} on {product_id} must be greater than -1, got {margin}")]
    MarginOverrideTooLow {
        client_id: ClientId,
        product_id: ProductId,
        margin: Decimal,
    },

    #[error("client {client_id} already has an override on {product_id}")]
    Duplicate {
        client_id: ClientId,
        product_id: ProductId,
    },
}

/// Load-time failures of the tier matrix parser. Rows and columns are
/// 1-based, as a spreadsheet user would count them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("matrix {0}: missing quantity tier header row")]
    MissingHeader(CalculationType),

    #[error("matrix {0}: header has no quantity tiers")]
    NoQuantityTiers(CalculationType),

    #[error("matrix {0}: no reference tier rows")]
    NoReferenceTiers(CalculationType),

    #[error("matrix {calculation_type}: row {row}, column {column}: '{value}' is not a number")]
    InvalidNumber {
        calculation_type: CalculationType,
        row: usize,
        column: usize,
        value: String,
    },

    #[error("matrix {calculation_type}: row {row}, column {column}: {value} must be positive")]
    NonPositive {
        calculation_type: CalculationType,
        row: usize,
        column: usize,
        value: Decimal,
    },

    #[error("matrix {calculation_type}: duplicate {axis} tier {tier}")]
    DuplicateTier {
        calculation_type: CalculationType,
        axis: &'static str,
        tier: Decimal,
    },

    #[error("matrix {calculation_type}: row {row} has {found} coefficients but only {expected} quantity tiers")]
    TooManyCells {
        calculation_type: CalculationType,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("matrix {calculation_type}: row {row} has no reference tier")]
    MissingReferenceTier {
        calculation_type: CalculationType,
        row: usize,
    },
}
