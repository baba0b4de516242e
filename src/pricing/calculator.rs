//! Sale price calculation.
//!
//! The pipeline, in order:
//!
//! 1. resolve the reference-currency cost and convert it with the product's
//!    exchange rate,
//! 2. mark it up by the product margin: `base = cost / (1 - margin)`,
//! 3. look up the tier coefficient for (reference value, quantity),
//! 4. scale: `base * coefficient`, divided by the matched quantity tier when
//!    less than one unit is bought,
//! 5. apply the client's override, if any (fixed price or margin over the
//!    single-unit price),
//! 6. freeze at the single-unit price when asked and no override applied,
//! 7. round the unit price up to tens, and the total up to tens (special
//!    pricing) or hundreds (standard pricing).

use crate::catalog::client_pricing::ClientPricingStore;
use crate::catalog::product_catalog::ProductCatalog;
use crate::core::client::{ClientId, OverrideRule};
use crate::core::error::PricingError;
use crate::core::exchange_rate::ExchangeRateProvider;
use crate::core::product::{Product, ProductId, RateName};
use crate::core::rounding::{RoundingIncrement, RoundingPolicy};
use crate::graph::cost_resolver::CostResolver;
use crate::pricing::special_price::SpecialPriceResolver;
use crate::pricing::tier_matrix::{TierLookup, TierMatrixSet};
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only inputs shared by every calculation.
#[derive(Clone, Copy)]
pub struct PricingContext<'a> {
    pub catalog: &'a dyn ProductCatalog,
    pub matrices: &'a TierMatrixSet,
    pub rates: &'a dyn ExchangeRateProvider,
    pub overrides: &'a dyn ClientPricingStore,
}

impl<'a> PricingContext<'a> {
    pub fn new(
        catalog: &'a dyn ProductCatalog,
        matrices: &'a TierMatrixSet,
        rates: &'a dyn ExchangeRateProvider,
        overrides: &'a dyn ClientPricingStore,
    ) -> Self {
        Self {
            catalog,
            matrices,
            rates,
            overrides,
        }
    }
}

/// What to price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub freeze_unit_price: bool,
}

impl PriceRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            client_id: None,
            freeze_unit_price: false,
        }
    }

    pub fn for_client(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Price every unit as if exactly one were bought.
    pub fn freeze_unit_price(mut self) -> Self {
        self.freeze_unit_price = true;
        self
    }
}

/// Every intermediate value of a calculation, for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub reference_cost: Decimal,
    pub rate_name: RateName,
    pub exchange_rate: Decimal,
    pub local_cost: Decimal,
    pub margin: Decimal,
    pub base_price: Decimal,
    /// Coefficient, tiers and `sub_unit` belong to the lookup that produced
    /// `unit_price_raw`: the single-unit lookup for frozen and
    /// margin-override quotes, the requested quantity otherwise.
    pub coefficient: Decimal,
    pub reference_tier_used: Decimal,
    pub quantity_tier_used: Decimal,
    /// Less than one unit was bought, so the tier price was divided by the
    /// tier size.
    pub sub_unit: bool,
    pub override_applied: Option<OverrideRule>,
    pub frozen: bool,
    pub unit_price_raw: Decimal,
    pub unit_price: Decimal,
    pub total_price_raw: Decimal,
    pub total_increment: RoundingIncrement,
    pub total_price: Decimal,
}

impl PriceBreakdown {
    /// Rounded unit price over local cost. Display only; 0.0 for a free
    /// product.
    pub fn markup_ratio(&self) -> f64 {
        if self.local_cost.is_zero() {
            return 0.0;
        }
        (self.unit_price / self.local_cost).to_f64().unwrap_or(0.0)
    }

    pub fn special_pricing_applied(&self) -> bool {
        self.override_applied.is_some()
    }
}

/// A priced request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub breakdown: PriceBreakdown,
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.breakdown;
        writeln!(f, "=== Price Quote: {} x {} ===", b.product_id, b.quantity)?;
        writeln!(f, "Reference cost:  {}", b.reference_cost)?;
        writeln!(f, "Exchange rate:   {} @ {}", b.rate_name, b.exchange_rate)?;
        writeln!(f, "Local cost:      {}", b.local_cost)?;
        writeln!(f, "Margin:          {}", b.margin)?;
        writeln!(f, "Base price:      {}", b.base_price)?;
        writeln!(
            f,
            "Coefficient:     {} (reference tier {}, quantity tier {}{})",
            b.coefficient,
            b.reference_tier_used,
            b.quantity_tier_used,
            if b.sub_unit { ", sub-unit" } else { "" }
        )?;
        match b.override_applied {
            Some(OverrideRule::FixedUnitPrice(price)) => {
                writeln!(f, "Override:        fixed unit price {}", price)?
            }
            Some(OverrideRule::MarginOverride(margin)) => {
                writeln!(f, "Override:        margin {} over unit price", margin)?
            }
            None if b.frozen => writeln!(f, "Override:        frozen at unit price")?,
            None => {}
        }
        writeln!(f, "Unit price:      {} (raw {})", self.unit_price, b.unit_price_raw)?;
        writeln!(
            f,
            "Total:           {} (raw {}, rounded to {})",
            self.total_price, b.total_price_raw, b.total_increment
        )?;
        Ok(())
    }
}

/// Unit price from steps 3 and 4 for one quantity.
struct TieredPrice {
    lookup: TierLookup,
    sub_unit: bool,
    unit_price_raw: Decimal,
}

/// Turns product costs into sale prices.
///
/// Holds only shared references, so one calculator can serve many threads.
///
/// # Examples
///
/// ```
/// use pricing_engine::catalog::client_pricing::InMemoryClientPricing;
/// use pricing_engine::catalog::product_catalog::InMemoryCatalog;
/// use pricing_engine::core::exchange_rate::ExchangeRateTable;
/// use pricing_engine::core::product::{Product, RateName};
/// use pricing_engine::pricing::calculator::{PriceCalculator, PriceRequest, PricingContext};
/// use pricing_engine::pricing::tier_matrix::TierMatrixSet;
/// use rust_decimal_macros::dec;
///
/// let mut catalog = InMemoryCatalog::new();
/// catalog.insert_product(Product::base_cost("P", dec!(2.00), "LIQUID", dec!(0), dec!(0.20))).unwrap();
/// let mut matrices = TierMatrixSet::new();
/// matrices.load("LIQUID".into(), ",,1,5\nref,label,1,5\n0,all,0.95,0.90").unwrap();
/// let rates = ExchangeRateTable::new().with_rate(RateName::Official, dec!(1000)).unwrap();
/// let overrides = InMemoryClientPricing::new();
///
/// let calculator = PriceCalculator::new(PricingContext::new(&catalog, &matrices, &rates, &overrides));
/// let quote = calculator.calculate_price(&PriceRequest::new("P", dec!(5))).unwrap();
/// assert_eq!(quote.unit_price, dec!(2250));
/// assert_eq!(quote.total_price, dec!(11300));
/// ```
pub struct PriceCalculator<'a> {
    context: PricingContext<'a>,
}

impl<'a> PriceCalculator<'a> {
    pub fn new(context: PricingContext<'a>) -> Self {
        Self { context }
    }

    /// Reference-currency cost of a product.
    pub fn resolve_cost(&self, product_id: &ProductId) -> Result<Decimal, PricingError> {
        CostResolver::new(self.context.catalog).resolve_cost(product_id)
    }

    pub fn calculate_price(&self, request: &PriceRequest) -> Result<PriceQuote, PricingError> {
        let quantity = request.quantity;
        if quantity <= Decimal::ZERO {
            return Err(PricingError::InvalidQuantity(quantity));
        }
        let product = self
            .context
            .catalog
            .get_product(&request.product_id)
            .ok_or_else(|| PricingError::ProductNotFound(request.product_id.clone()))?;
        let overflow = || PricingError::Overflow {
            product_id: product.id.clone(),
            quantity,
        };

        // 1. cost base
        let reference_cost = self.resolve_cost(&product.id)?;
        let exchange_rate = self
            .context
            .rates
            .rate(product.exchange_rate)
            .ok_or(PricingError::RateNotConfigured(product.exchange_rate))?;
        let local_cost = reference_cost
            .checked_mul(exchange_rate)
            .ok_or_else(overflow)?;

        // 2. margin markup
        let base_price = markup(product, local_cost)?.ok_or_else(overflow)?;

        // 3 + 4. tier coefficient and quantity scaling
        let mut tiered = self.tiered_price(product, base_price, quantity)?;
        let mut unit_price_raw = tiered.unit_price_raw;

        // 5. special client pricing
        let special = request.client_id.as_ref().and_then(|client_id| {
            SpecialPriceResolver::new(self.context.overrides)
                .lookup_active_override(client_id, &product.id)
        });
        let override_applied = match special {
            Some(found) => {
                unit_price_raw = match found.rule {
                    OverrideRule::FixedUnitPrice(price) => price,
                    OverrideRule::MarginOverride(margin) => {
                        tiered = self.single_unit_price(product, base_price, tiered, quantity)?;
                        tiered
                            .unit_price_raw
                            .checked_mul(Decimal::ONE + margin)
                            .ok_or_else(overflow)?
                    }
                };
                Some(found.rule)
            }
            None => None,
        };
        let anchored = override_applied.is_some();

        // 6. explicit freeze
        let frozen = !anchored && request.freeze_unit_price;
        if frozen {
            tiered = self.single_unit_price(product, base_price, tiered, quantity)?;
            unit_price_raw = tiered.unit_price_raw;
        }

        // 7. rounding
        let unit_price = RoundingPolicy::checked_round_up(unit_price_raw, RoundingIncrement::Ten)
            .ok_or_else(overflow)?;
        let total_price_raw = unit_price.checked_mul(quantity).ok_or_else(overflow)?;
        let total_increment = if anchored {
            RoundingIncrement::Ten
        } else {
            RoundingIncrement::Hundred
        };
        let total_price = RoundingPolicy::checked_round_up(total_price_raw, total_increment)
            .ok_or_else(overflow)?;

        debug!(
            "priced {} x {}: unit {} total {} (override: {}, frozen: {})",
            product.id, quantity, unit_price, total_price, anchored, frozen
        );

        Ok(PriceQuote {
            unit_price,
            total_price,
            breakdown: PriceBreakdown {
                product_id: product.id.clone(),
                quantity,
                reference_cost,
                rate_name: product.exchange_rate,
                exchange_rate,
                local_cost,
                margin: product.margin,
                base_price,
                coefficient: tiered.lookup.coefficient,
                reference_tier_used: tiered.lookup.reference_tier_used,
                quantity_tier_used: tiered.lookup.quantity_tier_used,
                sub_unit: tiered.sub_unit,
                override_applied,
                frozen,
                unit_price_raw,
                unit_price,
                total_price_raw,
                total_increment,
                total_price,
            },
        })
    }

    fn tiered_price(
        &self,
        product: &Product,
        base_price: Decimal,
        quantity: Decimal,
    ) -> Result<TieredPrice, PricingError> {
        let lookup = self.context.matrices.lookup(
            &product.calculation_type,
            product.reference_value,
            quantity,
        )?;
        let overflow = || PricingError::Overflow {
            product_id: product.id.clone(),
            quantity,
        };
        let tier_price = base_price
            .checked_mul(lookup.coefficient)
            .ok_or_else(overflow)?;
        // The coefficient prices the whole matched tier.
        let sub_unit = quantity < Decimal::ONE;
        let unit_price_raw = if sub_unit {
            tier_price
                .checked_div(lookup.quantity_tier_used)
                .ok_or_else(overflow)?
        } else {
            tier_price
        };
        Ok(TieredPrice {
            lookup,
            sub_unit,
            unit_price_raw,
        })
    }

    /// Steps 3 and 4 forced to a quantity of one. Hands `tiered` back when it
    /// was already computed for one unit.
    fn single_unit_price(
        &self,
        product: &Product,
        base_price: Decimal,
        tiered: TieredPrice,
        quantity: Decimal,
    ) -> Result<TieredPrice, PricingError> {
        if quantity == Decimal::ONE {
            return Ok(tiered);
        }
        self.tiered_price(product, base_price, Decimal::ONE)
    }
}

/// `local_cost / (1 - margin)`, or `None` when the quotient leaves the
/// decimal range.
fn markup(product: &Product, local_cost: Decimal) -> Result<Option<Decimal>, PricingError> {
    if product.margin < Decimal::ZERO || product.margin >= Decimal::ONE {
        return Err(PricingError::InvalidMargin {
            product_id: product.id.clone(),
            margin: product.margin,
        });
    }
    Ok(local_cost.checked_div(Decimal::ONE - product.margin))
}
