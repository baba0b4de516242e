use crate::core::product::RateName;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors arising from exchange rate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("exchange rate must be positive, got {rate} for {name}")]
    InvalidRate { name: RateName, rate: Decimal },
}

/// Source of the reference-to-local currency conversion factors.
///
/// Reads are point-in-time: the engine asks once per calculation step and
/// holds no lock in between.
pub trait ExchangeRateProvider: Send + Sync {
    /// Local-currency units per one reference-currency unit, or `None` if
    /// the rate is not configured.
    fn rate(&self, name: RateName) -> Option<Decimal>;
}

/// In-memory exchange rate table.
///
/// # Examples
///
/// ```
/// use pricing_engine::core::exchange_rate::{ExchangeRateProvider, ExchangeRateTable};
/// use pricing_engine::core::product::RateName;
/// use rust_decimal_macros::dec;
///
/// let mut rates = ExchangeRateTable::new();
/// rates.set_rate(RateName::Official, dec!(1000)).unwrap();
///
/// assert_eq!(rates.rate(RateName::Official), Some(dec!(1000)));
/// assert_eq!(rates.rate(RateName::Company), None);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRateTable {
    rates: BTreeMap<RateName, Decimal>,
}

impl ExchangeRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a rate: 1 reference-currency unit = `rate` local units.
    pub fn set_rate(&mut self, name: RateName, rate: Decimal) -> Result<(), RateError> {
        if rate <= Decimal::ZERO {
            return Err(RateError::InvalidRate { name, rate });
        }
        self.rates.insert(name, rate);
        Ok(())
    }

    /// Builder-style variant of [`set_rate`](Self::set_rate).
    pub fn with_rate(mut self, name: RateName, rate: Decimal) -> Result<Self, RateError> {
        self.set_rate(name, rate)?;
        Ok(self)
    }

    /// Re-check every rate; used after deserializing an untrusted table.
    pub fn validate(&self) -> Result<(), RateError> {
        match self.rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            Some((name, rate)) => Err(RateError::InvalidRate {
                name: *name,
                rate: *rate,
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl ExchangeRateProvider for ExchangeRateTable {
    fn rate(&self, name: RateName) -> Option<Decimal> {
        self.rates.get(&name).copied()
    }
}
