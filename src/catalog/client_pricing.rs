use crate::core::client::{ClientId, ClientPriceOverride};
use crate::core::error::OverrideError;
use crate::core::product::ProductId;
use std::collections::HashMap;

/// Lookup of per-client negotiated prices.
pub trait ClientPricingStore: Send + Sync {
    /// The active override for (client, product), if any.
    fn get_active_override(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
    ) -> Option<&ClientPriceOverride>;
}

/// Overrides held in memory, unique per (client, product).
#[derive(Debug, Clone, Default)]
pub struct InMemoryClientPricing {
    overrides: HashMap<(ClientId, ProductId), ClientPriceOverride>,
}

impl InMemoryClientPricing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the override for its (client, product) pair.
    /// Returns the override it replaced.
    pub fn upsert(
        &mut self,
        price_override: ClientPriceOverride,
    ) -> Result<Option<ClientPriceOverride>, OverrideError> {
        price_override.validate()?;
        let key = (
            price_override.client_id.clone(),
            price_override.product_id.clone(),
        );
        Ok(self.overrides.insert(key, price_override))
    }

    /// Add an override for a pair that has none yet.
    pub fn insert(&mut self, price_override: ClientPriceOverride) -> Result<(), OverrideError> {
        price_override.validate()?;
        let key = (
            price_override.client_id.clone(),
            price_override.product_id.clone(),
        );
        if self.overrides.contains_key(&key) {
            let (client_id, product_id) = key;
            return Err(OverrideError::Duplicate {
                client_id,
                product_id,
            });
        }
        self.overrides.insert(key, price_override);
        Ok(())
    }

    /// Mark the pair's override inactive. Returns false if none exists.
    pub fn deactivate(&mut self, client_id: &ClientId, product_id: &ProductId) -> bool {
        match self
            .overrides
            .get_mut(&(client_id.clone(), product_id.clone()))
        {
            Some(existing) => {
                existing.active = false;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl ClientPricingStore for InMemoryClientPricing {
    fn get_active_override(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
    ) -> Option<&ClientPriceOverride> {
        self.overrides
            .get(&(client_id.clone(), product_id.clone()))
            .filter(|o| o.active)
    }
}
