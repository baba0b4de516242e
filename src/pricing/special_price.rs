use crate::catalog::client_pricing::ClientPricingStore;
use crate::core::client::{ClientId, ClientPriceOverride};
use crate::core::product::ProductId;
use log::{debug, warn};

/// Finds the negotiated price rule that applies to a client.
///
/// Pure lookup. The arithmetic for both override modes lives in the price
/// calculator.
#[derive(Clone, Copy)]
pub struct SpecialPriceResolver<'a> {
    store: &'a dyn ClientPricingStore,
}

impl<'a> SpecialPriceResolver<'a> {
    pub fn new(store: &'a dyn ClientPricingStore) -> Self {
        Self { store }
    }

    /// The active override for (client, product). An inactive override
    /// handed back by the store is ignored.
    pub fn lookup_active_override(
        &self,
        client_id: &ClientId,
        product_id: &ProductId,
    ) -> Option<&'a ClientPriceOverride> {
        let found = self.store.get_active_override(client_id, product_id)?;
        if !found.active {
            warn!(
                "store returned inactive override for client {} on {}; ignoring it",
                client_id, product_id
            );
            return None;
        }
        debug!(
            "client {} has override {:?} on {}",
            client_id, found.rule, product_id
        );
        Some(found)
    }
}
