use crate::core::error::OverrideError;
use crate::core::product::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a client account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The two mutually exclusive ways a client override replaces the
/// standard unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum OverrideRule {
    /// The unit price is exactly this amount, whatever the quantity.
    FixedUnitPrice(Decimal),
    /// The unit price is the single-unit standard price marked up by this
    /// fraction.
    MarginOverride(Decimal),
}

/// A negotiated price rule for one client on one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPriceOverride {
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub rule: OverrideRule,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ClientPriceOverride {
    pub fn fixed(client_id: ClientId, product_id: ProductId, unit_price: Decimal) -> Self {
        Self {
            client_id,
            product_id,
            rule: OverrideRule::FixedUnitPrice(unit_price),
            active: true,
        }
    }

    pub fn margin(client_id: ClientId, product_id: ProductId, margin: Decimal) -> Self {
        Self {
            client_id,
            product_id,
            rule: OverrideRule::MarginOverride(margin),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn validate(&self) -> Result<(), OverrideError> {
        match self.rule {
            OverrideRule::FixedUnitPrice(price) if price <= Decimal::ZERO => {
                Err(OverrideError::NonPositiveFixedPrice {
                    client_id: self.client_id.clone(),
                    product_id: self.product_id.clone(),
                    price,
                })
            }
            OverrideRule::MarginOverride(margin) if margin <= Decimal::NEGATIVE_ONE => {
                Err(OverrideError::MarginOverrideTooLow {
                    client_id: self.client_id.clone(),
                    product_id: self.product_id.clone(),
                    margin,
                })
            }
            _ => Ok(()),
        }
    }
}
