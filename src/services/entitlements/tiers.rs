use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::models::legacy::LEGACY_AIMING_COURSE;
use crate::models::tier::SubscriptionTier;

static DEFAULT_PRICE_TIERS: Lazy<HashMap<String, SubscriptionTier>> = Lazy::new(|| {
    [
        ("price_1SqztNRpdm3uvDfu5wcHwFum", SubscriptionTier::Competitor),
        ("price_1SqzuiRpdm3uvDfuzehsoDZt", SubscriptionTier::Professional),
        ("price_1Sr3ETRpdm3uvDfuEEfNt7P1", SubscriptionTier::HustonSchool),
    ]
    .into_iter()
    .map(|(price, tier)| (price.to_string(), tier))
    .collect()
});

pub const DEFAULT_ONE_TIME_PRODUCTS: &[&str] = &["prod_SM4VhVapcll6nZ", LEGACY_AIMING_COURSE];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid price tier entry '{0}', expected price_id=tier")]
pub struct PriceTierParseError(pub String);

/// Immutable price id to tier lookup. Unmapped prices resolve to `Free`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTierMap {
    prices: HashMap<String, SubscriptionTier>,
}

impl Default for PriceTierMap {
    fn default() -> Self {
        Self {
            prices: DEFAULT_PRICE_TIERS.clone(),
        }
    }
}

impl PriceTierMap {
    pub fn new(prices: HashMap<String, SubscriptionTier>) -> Self {
        Self { prices }
    }

    /// Parses `price_a=competitor,price_b=professional`. Entries naming an unknown tier are
    /// rejected so a typo cannot silently under-tier every subscriber of that price.
    pub fn parse(raw: &str) -> Result<Self, PriceTierParseError> {
        let mut prices = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (price, tier) = entry
                .split_once('=')
                .ok_or_else(|| PriceTierParseError(entry.to_string()))?;
            let price = price.trim();
            let tier = SubscriptionTier::parse(tier)
                .ok_or_else(|| PriceTierParseError(entry.to_string()))?;
            if price.is_empty() {
                return Err(PriceTierParseError(entry.to_string()));
            }
            prices.insert(price.to_string(), tier);
        }
        Ok(Self { prices })
    }

    pub fn resolve_tier(&self, price_id: &str) -> SubscriptionTier {
        self.prices
            .get(price_id.trim())
            .copied()
            .unwrap_or(SubscriptionTier::Free)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Products bought once (not subscribed to) that unlock `hasOneTimePurchase`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeProducts {
    products: HashSet<String>,
}

impl Default for OneTimeProducts {
    fn default() -> Self {
        Self::from_list(DEFAULT_ONE_TIME_PRODUCTS.iter().copied())
    }
}

impl OneTimeProducts {
    pub fn from_list<'a>(products: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::from_list(raw.split(','))
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.products.contains(product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prices_resolve_to_their_tiers() {
        let map = PriceTierMap::default();
        assert_eq!(
            map.resolve_tier("price_1SqztNRpdm3uvDfu5wcHwFum"),
            SubscriptionTier::Competitor
        );
        assert_eq!(
            map.resolve_tier("price_1SqzuiRpdm3uvDfuzehsoDZt"),
            SubscriptionTier::Professional
        );
        assert_eq!(
            map.resolve_tier("price_1Sr3ETRpdm3uvDfuEEfNt7P1"),
            SubscriptionTier::HustonSchool
        );
    }

    #[test]
    fn unmapped_or_malformed_prices_fall_open_to_free() {
        let map = PriceTierMap::default();
        for price in ["price_unknown", "", "   ", "💸", "price_1SqztNRpdm3uvDfu5wcHwFum_x"] {
            assert_eq!(map.resolve_tier(price), SubscriptionTier::Free, "{price:?}");
        }
    }

    #[test]
    fn parses_configured_overrides() {
        let map = PriceTierMap::parse(" price_a=competitor, price_b=hustonSchool ,").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve_tier("price_a"), SubscriptionTier::Competitor);
        assert_eq!(map.resolve_tier("price_b"), SubscriptionTier::HustonSchool);
        assert_eq!(
            map.resolve_tier("price_1SqztNRpdm3uvDfu5wcHwFum"),
            SubscriptionTier::Free
        );
    }

    #[test]
    fn rejects_malformed_override_entries() {
        assert!(PriceTierMap::parse("price_a").is_err());
        assert!(PriceTierMap::parse("price_a=gold").is_err());
        assert!(PriceTierMap::parse("=competitor").is_err());
    }

    #[test]
    fn one_time_products_default_and_parse() {
        let defaults = OneTimeProducts::default();
        assert!(defaults.contains("prod_SM4VhVapcll6nZ"));
        assert!(defaults.contains("3d_aiming_course"));
        let parsed = OneTimeProducts::parse("prod_x, ,prod_y");
        assert!(parsed.contains("prod_x"));
        assert!(parsed.contains("prod_y"));
        assert!(!parsed.contains(""));
    }
}
