//! Provider webhook configuration
//!
//! Each secret can be set as `PAYHOOK__WEBHOOKS__HOTMART_SECRET` or through
//! the provider's conventional variable, e.g. `HOTMART_WEBHOOK_SECRET`.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::application::handlers::ProviderSecrets;
use crate::domain::webhook::signature::DEFAULT_TOLERANCE_SECS;
use crate::domain::webhook::{Platform, ProductCatalog, SignatureVerifierRegistry};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhooksConfig {
    pub hotmart_secret: Option<Secret<String>>,
    pub eduzz_secret: Option<Secret<String>>,
    pub stripe_secret: Option<Secret<String>>,
    pub kirvano_secret: Option<Secret<String>>,
    pub monetizze_secret: Option<Secret<String>>,

    /// Maximum age of a timestamped signature, in seconds
    #[serde(default = "default_tolerance")]
    pub stripe_tolerance_secs: i64,

    /// Extra `platform:product=plan` entries, `;`-separated
    pub product_map: Option<String>,
}

impl WebhooksConfig {
    fn slot(&mut self, platform: Platform) -> &mut Option<Secret<String>> {
        match platform {
            Platform::Hotmart => &mut self.hotmart_secret,
            Platform::Eduzz => &mut self.eduzz_secret,
            Platform::Stripe => &mut self.stripe_secret,
            Platform::Kirvano => &mut self.kirvano_secret,
            Platform::Monetizze => &mut self.monetizze_secret,
        }
    }

    fn secret(&self, platform: Platform) -> Option<&Secret<String>> {
        match platform {
            Platform::Hotmart => self.hotmart_secret.as_ref(),
            Platform::Eduzz => self.eduzz_secret.as_ref(),
            Platform::Stripe => self.stripe_secret.as_ref(),
            Platform::Kirvano => self.kirvano_secret.as_ref(),
            Platform::Monetizze => self.monetizze_secret.as_ref(),
        }
    }

    /// Fills unset secrets from `{PROVIDER}_WEBHOOK_SECRET` via `lookup`.
    pub fn with_env_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for platform in Platform::ALL {
            let slot = self.slot(platform);
            if slot.is_none() {
                *slot = lookup(platform.secret_env_var()).map(Secret::new);
            }
        }
        self
    }

    pub fn provider_secrets(&self) -> ProviderSecrets {
        Platform::ALL
            .into_iter()
            .fold(ProviderSecrets::new(), |secrets, platform| {
                match self.secret(platform) {
                    Some(secret) => secrets.with_secret(platform, secret.expose_secret().clone()),
                    None => secrets,
                }
            })
    }

    pub fn verifiers(&self) -> SignatureVerifierRegistry {
        SignatureVerifierRegistry::new(self.stripe_tolerance_secs)
    }

    pub fn catalog(&self) -> Result<ProductCatalog, ValidationError> {
        match self.product_map.as_deref() {
            Some(map) => ProductCatalog::new()
                .with_overrides(map)
                .map_err(|e| ValidationError::InvalidProductMap(e.to_string())),
            None => Ok(ProductCatalog::new()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.catalog()?;
        Ok(())
    }
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            hotmart_secret: None,
            eduzz_secret: None,
            stripe_secret: None,
            kirvano_secret: None,
            monetizze_secret: None,
            stripe_tolerance_secs: default_tolerance(),
            product_map: None,
        }
    }
}

fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::PlanType;

    #[test]
    fn env_fallback_fills_only_missing_secrets() {
        let config = WebhooksConfig {
            stripe_secret: Some(Secret::new("from-config".to_string())),
            ..Default::default()
        }
        .with_env_fallbacks(|name| match name {
            "STRIPE_WEBHOOK_SECRET" => Some("from-env".to_string()),
            "EDUZZ_WEBHOOK_SECRET" => Some("eduzz-env".to_string()),
            _ => None,
        });

        let secrets = config.provider_secrets();
        assert_eq!(secrets.get(Platform::Stripe), Some("from-config"));
        assert_eq!(secrets.get(Platform::Eduzz), Some("eduzz-env"));
        assert_eq!(secrets.get(Platform::Hotmart), None);
    }

    #[test]
    fn product_map_overrides_catalog() {
        let config = WebhooksConfig {
            product_map: Some("hotmart:12345=premium".to_string()),
            ..Default::default()
        };
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.resolve(Platform::Hotmart, "12345"), Some(PlanType::Premium));
    }

    #[test]
    fn malformed_product_map_fails_validation() {
        let config = WebhooksConfig {
            product_map: Some("hotmart-12345".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidProductMap(_))));
    }

    #[test]
    fn non_positive_tolerance_is_rejected() {
        let config = WebhooksConfig {
            stripe_tolerance_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
