//! HTTP notifier - posts upgrade notices to an external mailer endpoint.
//!
//! The call is notify-and-forget from the pipeline's point of view: the
//! caller logs failures and moves on.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::domain::webhook::PlanType;
use crate::ports::{NotifyError, UpgradeNotifier};

/// Configuration for the HTTP notifier.
#[derive(Debug, Clone)]
pub struct HttpNotifierConfig {
    pub endpoint: String,
    api_key: Option<Secret<String>>,
    pub timeout: Duration,
}

impl HttpNotifierConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Sends `Authorization: Bearer <key>` with every notice.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(api_key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct UpgradeNotice<'a> {
    template: &'static str,
    email: &'a str,
    plan: &'static str,
    plan_name: &'static str,
}

impl<'a> UpgradeNotice<'a> {
    fn new(email: &'a str, plan: PlanType) -> Self {
        Self {
            template: "plan_upgraded",
            email,
            plan: plan.as_str(),
            plan_name: plan.display_name(),
        }
    }
}

pub struct HttpUpgradeNotifier {
    config: HttpNotifierConfig,
    client: Client,
}

impl HttpUpgradeNotifier {
    pub fn new(config: HttpNotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl UpgradeNotifier for HttpUpgradeNotifier {
    async fn notify_upgrade(&self, email: &str, plan: PlanType) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&UpgradeNotice::new(email, plan));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Transport(format!(
                    "Timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_carries_plan_names() {
        let notice = UpgradeNotice::new("buyer@example.com", PlanType::Pro);
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["email"], "buyer@example.com");
        assert_eq!(json["plan"], "pro");
        assert_eq!(json["template"], "plan_upgraded");
    }

    #[test]
    fn config_builders_apply() {
        let config = HttpNotifierConfig::new("http://mailer.local/send")
            .with_api_key("k")
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.api_key.is_some());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let notifier = HttpUpgradeNotifier::new(
            HttpNotifierConfig::new("http://127.0.0.1:9/send")
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap();
        let err = notifier
            .notify_upgrade("buyer@example.com", PlanType::Starter)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
