//! ReceiveWebhookHandler - Command handler for inbound provider deliveries.
//!
//! Everything up to and including the enqueue happens here, synchronously,
//! so the provider gets an immediate accept or reject.

use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{JobId, WebhookEventId};
use crate::domain::job::EnqueueOptions;
use crate::domain::webhook::{
    EventExtractorRegistry, Platform, SignatureVerifierRegistry, WebhookError, WebhookEvent,
};
use crate::ports::{JobQueue, WebhookEventRepository};

/// Shared secret per provider. A platform without a secret never verifies.
#[derive(Debug, Clone, Default)]
pub struct ProviderSecrets {
    secrets: HashMap<Platform, Secret<String>>,
}

impl ProviderSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `secret` for `platform`; blank secrets are ignored.
    pub fn with_secret(mut self, platform: Platform, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.trim().is_empty() {
            self.secrets.insert(platform, Secret::new(secret));
        }
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&str> {
        self.secrets.get(&platform).map(|s| s.expose_secret().as_str())
    }

    pub fn configured(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.secrets.contains_key(p))
            .collect()
    }
}

/// Command carrying one delivery after platform detection.
#[derive(Debug, Clone)]
pub struct ReceiveWebhookCommand {
    pub platform: Platform,
    pub signature: Option<String>,
    pub body: Vec<u8>,
}

/// Outcome of an accepted delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveWebhookResult {
    /// Stored and enqueued for processing.
    Queued {
        event_id: WebhookEventId,
        job_id: JobId,
    },
    /// Verified but not a completed purchase; nothing stored.
    Ignored { reason: String },
}

impl ReceiveWebhookResult {
    pub fn message(&self) -> String {
        match self {
            ReceiveWebhookResult::Queued { .. } => "Webhook received and queued".to_string(),
            ReceiveWebhookResult::Ignored { reason } => format!("Webhook ignored: {}", reason),
        }
    }
}

pub struct ReceiveWebhookHandler {
    verifiers: SignatureVerifierRegistry,
    extractors: EventExtractorRegistry,
    secrets: ProviderSecrets,
    events: Arc<dyn WebhookEventRepository>,
    queue: Arc<dyn JobQueue>,
    enqueue_options: EnqueueOptions,
}

impl ReceiveWebhookHandler {
    pub fn new(
        verifiers: SignatureVerifierRegistry,
        secrets: ProviderSecrets,
        events: Arc<dyn WebhookEventRepository>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            verifiers,
            extractors: EventExtractorRegistry::new(),
            secrets,
            events,
            queue,
            enqueue_options: EnqueueOptions::default(),
        }
    }

    pub fn with_enqueue_options(mut self, options: EnqueueOptions) -> Self {
        self.enqueue_options = options;
        self
    }

    pub async fn handle(
        &self,
        cmd: ReceiveWebhookCommand,
    ) -> Result<ReceiveWebhookResult, WebhookError> {
        let platform = cmd.platform;

        // 1. Authenticate the raw body
        let signature = cmd
            .signature
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        let Some(secret) = self.secrets.get(platform) else {
            tracing::warn!(platform = %platform, "No webhook secret configured; rejecting delivery");
            return Err(WebhookError::SignatureVerificationFailed);
        };

        if !self.verifiers.verify(platform, signature, &cmd.body, secret) {
            tracing::warn!(platform = %platform, "Webhook signature verification failed");
            return Err(WebhookError::SignatureVerificationFailed);
        }

        // 2. Parse and extract the canonical purchase
        let payload: Value = serde_json::from_slice(&cmd.body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let Some(canonical) = self.extractors.extract(platform, &payload) else {
            tracing::info!(platform = %platform, "Webhook verified but not a completed purchase");
            return Ok(ReceiveWebhookResult::Ignored {
                reason: "not a completed purchase".to_string(),
            });
        };

        // 3. Persist, then enqueue before answering
        let event = WebhookEvent::received(platform, canonical, payload);
        self.events.insert(&event).await?;

        let job_id = self
            .queue
            .enqueue(event.id, self.enqueue_options)
            .await
            .map_err(|e| {
                tracing::error!(event_id = %event.id, error = %e, "Failed to enqueue webhook job");
                WebhookError::from(e)
            })?;

        tracing::info!(
            platform = %platform,
            event_id = %event.id,
            job_id = %job_id,
            transaction_id = %event.transaction_id,
            backend = self.queue.backend(),
            "Webhook queued"
        );

        Ok(ReceiveWebhookResult::Queued {
            event_id: event.id,
            job_id,
        })
    }
}
