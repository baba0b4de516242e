use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a catalog item (raw material or formulated product).
///
/// # Examples
///
/// ```
/// use pricing_engine::core::product::ProductId;
///
/// let resin = ProductId::new("RESIN-01");
/// let solvent = ProductId::new("SOLV-02");
/// assert_ne!(resin, solvent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Tag selecting which tier matrix prices a product (e.g. "LIQUID", "POWDER").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalculationType(String);

impl CalculationType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CalculationType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which configured exchange rate converts a product's reference-currency
/// cost into local currency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateName {
    #[default]
    Official,
    Company,
}

impl RateName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateName::Official => "OFFICIAL",
            RateName::Company => "COMPANY",
        }
    }
}

impl fmt::Display for RateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RateName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFFICIAL" => Ok(RateName::Official),
            "COMPANY" => Ok(RateName::Company),
            other => Err(format!("unknown exchange rate '{other}'")),
        }
    }
}

/// How a product's reference-currency cost is determined.
///
/// The three states are exclusive: a base cost is typed in by hand and may
/// still be missing, a formula cost is derived from ingredients (the stored
/// value is only the last propagated result), and a manual override pins a
/// cost that ingredient changes never touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CostSource {
    BaseCost {
        #[serde(default)]
        reference_cost: Option<Decimal>,
    },
    ComputedFromFormula {
        #[serde(default)]
        last_computed: Option<Decimal>,
    },
    ManualOverride { reference_cost: Decimal },
}

impl CostSource {
    /// The persisted cost, whatever its origin.
    pub fn stored_cost(&self) -> Option<Decimal> {
        match self {
            CostSource::BaseCost { reference_cost } => *reference_cost,
            CostSource::ComputedFromFormula { last_computed } => *last_computed,
            CostSource::ManualOverride { reference_cost } => Some(*reference_cost),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CostSource::ComputedFromFormula { .. })
    }

    pub fn is_base_cost(&self) -> bool {
        matches!(self, CostSource::BaseCost { .. })
    }
}

/// A sellable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_sale_unit")]
    pub sale_unit: String,
    /// Selects the tier matrix.
    pub calculation_type: CalculationType,
    /// Row key into the tier matrix.
    pub reference_value: Decimal,
    /// Fraction of the sale price that is markup, expected in [0, 1).
    pub margin: Decimal,
    pub cost: CostSource,
    #[serde(default)]
    pub exchange_rate: RateName,
    /// When the stored cost last changed through propagation.
    #[serde(default)]
    pub cost_updated_at: Option<DateTime<Utc>>,
}

fn default_sale_unit() -> String {
    "kg".to_string()
}

impl Product {
    /// A raw material priced from a typed-in base cost.
    pub fn base_cost(
        id: impl Into<ProductId>,
        reference_cost: Decimal,
        calculation_type: impl Into<CalculationType>,
        reference_value: Decimal,
        margin: Decimal,
    ) -> Self {
        Self::with_cost(
            id.into(),
            CostSource::BaseCost {
                reference_cost: Some(reference_cost),
            },
            calculation_type.into(),
            reference_value,
            margin,
        )
    }

    /// A formulated product whose cost derives from its ingredients.
    pub fn formulated(
        id: impl Into<ProductId>,
        calculation_type: impl Into<CalculationType>,
        reference_value: Decimal,
        margin: Decimal,
    ) -> Self {
        Self::with_cost(
            id.into(),
            CostSource::ComputedFromFormula {
                last_computed: None,
            },
            calculation_type.into(),
            reference_value,
            margin,
        )
    }

    pub fn with_cost(
        id: ProductId,
        cost: CostSource,
        calculation_type: CalculationType,
        reference_value: Decimal,
        margin: Decimal,
    ) -> Self {
        Self {
            name: id.to_string(),
            id,
            sale_unit: default_sale_unit(),
            calculation_type,
            reference_value,
            margin,
            cost,
            exchange_rate: RateName::Official,
            cost_updated_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_sale_unit(mut self, unit: impl Into<String>) -> Self {
        self.sale_unit = unit.into();
        self
    }

    pub fn with_exchange_rate(mut self, rate: RateName) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn stored_cost(&self) -> Option<Decimal> {
        self.cost.stored_cost()
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ProductId> for ProductId {
    fn from(id: &ProductId) -> Self {
        id.clone()
    }
}
