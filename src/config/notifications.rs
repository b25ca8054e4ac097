//! Upgrade notification configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use crate::adapters::notify::HttpNotifierConfig;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Email service endpoint. Notices are only logged when unset.
    pub endpoint: Option<String>,

    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl NotificationsConfig {
    /// HTTP notifier settings, if an endpoint is configured.
    pub fn http(&self) -> Option<HttpNotifierConfig> {
        let endpoint = self.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
        let config = HttpNotifierConfig::new(endpoint)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        Some(match &self.api_key {
            Some(key) => config.with_api_key(key.expose_secret().clone()),
            None => config,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.endpoint.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() && !e.starts_with("http://") && !e.starts_with("https://") => {
                Err(ValidationError::InvalidNotificationEndpoint)
            }
            _ if self.timeout_secs == 0 => Err(ValidationError::InvalidTimeout),
            _ => Ok(()),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_means_no_http_notifier() {
        assert!(NotificationsConfig::default().http().is_none());
    }

    #[test]
    fn endpoint_builds_http_config() {
        let config = NotificationsConfig {
            endpoint: Some("https://mail.example.com/send".to_string()),
            timeout_secs: 2,
            ..Default::default()
        };
        let http = config.http().unwrap();
        assert_eq!(http.endpoint, "https://mail.example.com/send");
        assert_eq!(http.timeout, Duration::from_secs(2));
    }

    #[test]
    fn non_http_endpoint_is_invalid() {
        let config = NotificationsConfig {
            endpoint: Some("smtp://mail.example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidNotificationEndpoint)));
    }
}
