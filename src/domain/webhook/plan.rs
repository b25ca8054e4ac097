//! Plan types and the product catalog that maps provider products to them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

use super::platform::Platform;

/// Length of one billing period granted by an upgrade.
pub const BILLING_PERIOD_DAYS: i64 = 30;

/// Entitlement tier a purchase upgrades an account to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Starter,
    Pro,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Starter => "starter",
            PlanType::Pro => "pro",
            PlanType::Premium => "premium",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanType::Free)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlanType::Free => "Free",
            PlanType::Starter => "Starter",
            PlanType::Pro => "Pro",
            PlanType::Premium => "Premium",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanType::Free),
            "starter" => Ok(PlanType::Starter),
            "pro" => Ok(PlanType::Pro),
            "premium" => Ok(PlanType::Premium),
            other => Err(ValidationError::invalid_format(
                "plan_type",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

static DEFAULT_PRODUCTS: Lazy<HashMap<(Platform, &'static str), PlanType>> = Lazy::new(|| {
    HashMap::from([
        ((Platform::Stripe, "price_starter_monthly"), PlanType::Starter),
        ((Platform::Stripe, "price_pro_monthly"), PlanType::Pro),
        ((Platform::Stripe, "price_premium_monthly"), PlanType::Premium),
        ((Platform::Hotmart, "HM-STARTER"), PlanType::Starter),
        ((Platform::Hotmart, "HM-PRO"), PlanType::Pro),
        ((Platform::Hotmart, "HM-PREMIUM"), PlanType::Premium),
        ((Platform::Eduzz, "ED-STARTER"), PlanType::Starter),
        ((Platform::Eduzz, "ED-PRO"), PlanType::Pro),
        ((Platform::Eduzz, "ED-PREMIUM"), PlanType::Premium),
        ((Platform::Kirvano, "KV-STARTER"), PlanType::Starter),
        ((Platform::Kirvano, "KV-PRO"), PlanType::Pro),
        ((Platform::Kirvano, "KV-PREMIUM"), PlanType::Premium),
        ((Platform::Monetizze, "MZ-STARTER"), PlanType::Starter),
        ((Platform::Monetizze, "MZ-PRO"), PlanType::Pro),
        ((Platform::Monetizze, "MZ-PREMIUM"), PlanType::Premium),
    ])
});

/// Static product → plan table per platform, with configured overrides.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    overrides: HashMap<(Platform, String), PlanType>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mapping.
    pub fn with_product(
        mut self,
        platform: Platform,
        product_id: impl Into<String>,
        plan: PlanType,
    ) -> Self {
        self.overrides.insert((platform, product_id.into()), plan);
        self
    }

    /// Parses `platform:product=plan` entries separated by `;` or `,`.
    pub fn with_overrides(mut self, entries: &str) -> Result<Self, ValidationError> {
        for entry in entries.split([';', ',']).map(str::trim).filter(|e| !e.is_empty()) {
            let (key, plan) = entry.split_once('=').ok_or_else(|| {
                ValidationError::invalid_format("product_map", format!("missing '=' in '{}'", entry))
            })?;
            let (platform, product) = key.split_once(':').ok_or_else(|| {
                ValidationError::invalid_format("product_map", format!("missing ':' in '{}'", entry))
            })?;
            let platform: Platform = platform.parse().map_err(|_| {
                ValidationError::invalid_format("product_map", format!("unknown platform in '{}'", entry))
            })?;
            let product = product.trim();
            if product.is_empty() {
                return Err(ValidationError::empty_field("product_map.product"));
            }
            self.overrides.insert((platform, product.to_string()), plan.parse()?);
        }
        Ok(self)
    }

    pub fn resolve(&self, platform: Platform, product_id: &str) -> Option<PlanType> {
        self.overrides
            .get(&(platform, product_id.to_string()))
            .or_else(|| DEFAULT_PRODUCTS.get(&(platform, product_id)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PlanType::Pro).unwrap(), "\"pro\"");
        let plan: PlanType = serde_json::from_str("\"premium\"").unwrap();
        assert_eq!(plan, PlanType::Premium);
    }

    #[test]
    fn free_is_not_paid() {
        assert!(!PlanType::Free.is_paid());
        assert!(PlanType::Starter.is_paid());
    }

    #[test]
    fn stripe_pro_price_maps_to_pro() {
        let catalog = ProductCatalog::new();
        assert_eq!(
            catalog.resolve(Platform::Stripe, "price_pro_monthly"),
            Some(PlanType::Pro)
        );
    }

    #[test]
    fn catalog_is_scoped_per_platform() {
        let catalog = ProductCatalog::new();
        assert_eq!(catalog.resolve(Platform::Hotmart, "price_pro_monthly"), None);
        assert_eq!(catalog.resolve(Platform::Stripe, "unknown"), None);
    }

    #[test]
    fn overrides_take_precedence() {
        let catalog = ProductCatalog::new()
            .with_overrides("stripe:price_pro_monthly=premium; hotmart:4455=starter")
            .unwrap();

        assert_eq!(
            catalog.resolve(Platform::Stripe, "price_pro_monthly"),
            Some(PlanType::Premium)
        );
        assert_eq!(catalog.resolve(Platform::Hotmart, "4455"), Some(PlanType::Starter));
    }

    #[test]
    fn malformed_overrides_are_rejected() {
        assert!(ProductCatalog::new().with_overrides("stripe-price=pro").is_err());
        assert!(ProductCatalog::new().with_overrides("paypal:x=pro").is_err());
        assert!(ProductCatalog::new().with_overrides("stripe:x=gold").is_err());
        assert!(ProductCatalog::new().with_overrides("stripe:=pro").is_err());
    }
}
