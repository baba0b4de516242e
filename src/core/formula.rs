use crate::core::error::FormulaError;
use crate::core::product::ProductId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Allowed distance between the item percentage sum and 100.
pub const PERCENTAGE_TOLERANCE: Decimal = dec!(0.01);

/// One ingredient line of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaItem {
    pub ingredient: ProductId,
    /// Share of the ingredient in the formula, in (0, 100].
    pub percentage: Decimal,
}

impl FormulaItem {
    pub fn new(ingredient: impl Into<ProductId>, percentage: Decimal) -> Self {
        Self {
            ingredient: ingredient.into(),
            percentage,
        }
    }

    /// Fraction of the formula this item accounts for.
    pub fn weight(&self) -> Decimal {
        self.percentage / Decimal::ONE_HUNDRED
    }
}

/// The recipe of a formulated product: an ordered, weighted list of
/// ingredients whose percentages add up to 100.
///
/// A formula can only be obtained through [`Formula::new`], so every value
/// of this type satisfies the percentage and self-reference invariants.
/// Acyclicity across formulas is not a property of a single formula and is
/// checked when costs are resolved.
///
/// # Examples
///
/// ```
/// use pricing_engine::core::formula::{Formula, FormulaItem};
/// use pricing_engine::core::product::ProductId;
/// use rust_decimal_macros::dec;
///
/// let formula = Formula::new(
///     ProductId::new("PAINT"),
///     vec![
///         FormulaItem::new("RESIN", dec!(60)),
///         FormulaItem::new("SOLVENT", dec!(40)),
///     ],
/// )
/// .unwrap();
/// assert_eq!(formula.items().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    product_id: ProductId,
    items: Vec<FormulaItem>,
}

impl Formula {
    pub fn new(product_id: ProductId, items: Vec<FormulaItem>) -> Result<Self, FormulaError> {
        if items.is_empty() {
            return Err(FormulaError::Empty(product_id));
        }

        let mut seen = HashSet::new();
        let mut total = Decimal::ZERO;
        for item in &items {
            if item.ingredient == product_id {
                return Err(FormulaError::SelfReference(product_id));
            }
            if item.percentage <= Decimal::ZERO || item.percentage > Decimal::ONE_HUNDRED {
                return Err(FormulaError::InvalidPercentage {
                    owner: product_id,
                    ingredient: item.ingredient.clone(),
                    percentage: item.percentage,
                });
            }
            if !seen.insert(&item.ingredient) {
                return Err(FormulaError::DuplicateIngredient {
                    owner: product_id.clone(),
                    ingredient: item.ingredient.clone(),
                });
            }
            total += item.percentage;
        }

        if (total - Decimal::ONE_HUNDRED).abs() > PERCENTAGE_TOLERANCE {
            return Err(FormulaError::PercentageSum {
                owner: product_id,
                total,
            });
        }

        Ok(Self { product_id, items })
    }

    /// The formula product that owns this recipe.
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn items(&self) -> &[FormulaItem] {
        &self.items
    }

    pub fn ingredients(&self) -> impl Iterator<Item = &ProductId> {
        self.items.iter().map(|item| &item.ingredient)
    }

    pub fn total_percentage(&self) -> Decimal {
        self.items.iter().map(|item| item.percentage).sum()
    }
}

/// Unvalidated wire form of a formula, as found in catalog snapshots.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormulaInput {
    pub product_id: ProductId,
    pub items: Vec<FormulaItem>,
}

impl TryFrom<FormulaInput> for Formula {
    type Error = FormulaError;

    fn try_from(input: FormulaInput) -> Result<Self, Self::Error> {
        Formula::new(input.product_id, input.items)
    }
}

impl<'de> Deserialize<'de> for Formula {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = FormulaInput::deserialize(deserializer)?;
        Formula::try_from(input).map_err(serde::de::Error::custom)
    }
}
