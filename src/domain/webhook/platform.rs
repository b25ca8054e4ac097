//! Supported payment providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::WebhookError;

/// Payment provider that delivered a webhook.
///
/// The set is closed: adding a provider means adding a variant here plus one
/// verifier and one extractor arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Hotmart,
    Eduzz,
    Stripe,
    Kirvano,
    Monetizze,
}

impl Platform {
    /// Every provider, in detection order.
    pub const ALL: [Platform; 5] = [
        Platform::Hotmart,
        Platform::Eduzz,
        Platform::Stripe,
        Platform::Kirvano,
        Platform::Monetizze,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Hotmart => "hotmart",
            Platform::Eduzz => "eduzz",
            Platform::Stripe => "stripe",
            Platform::Kirvano => "kirvano",
            Platform::Monetizze => "monetizze",
        }
    }

    /// Header the provider puts its signature in.
    pub fn signature_header(&self) -> &'static str {
        match self {
            Platform::Hotmart => "x-hotmart-signature",
            Platform::Eduzz => "x-eduzz-signature",
            Platform::Stripe => "stripe-signature",
            Platform::Kirvano => "x-kirvano-signature",
            Platform::Monetizze => "x-monetizze-signature",
        }
    }

    /// Lower-case substring expected in the provider's User-Agent.
    pub fn user_agent_hint(&self) -> &'static str {
        self.as_str()
    }

    /// Environment variable holding the provider's shared secret.
    pub fn secret_env_var(&self) -> &'static str {
        match self {
            Platform::Hotmart => "HOTMART_WEBHOOK_SECRET",
            Platform::Eduzz => "EDUZZ_WEBHOOK_SECRET",
            Platform::Stripe => "STRIPE_WEBHOOK_SECRET",
            Platform::Kirvano => "KIRVANO_WEBHOOK_SECRET",
            Platform::Monetizze => "MONETIZZE_WEBHOOK_SECRET",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(WebhookError::InvalidPlatform)
    }
}
