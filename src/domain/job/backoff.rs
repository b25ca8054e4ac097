//! Retry delays.

use std::time::Duration;

use crate::domain::foundation::ValidationError;

/// Escalating retry delays indexed by attempt number (1-based), capped at
/// the last tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    tiers: Vec<Duration>,
}

impl BackoffPolicy {
    pub const DEFAULT_TIERS_SECS: [u64; 4] = [1, 5, 15, 60];

    /// Builds a policy from second values. Tiers must be non-empty and
    /// non-decreasing.
    pub fn from_secs(tiers: &[u64]) -> Result<Self, ValidationError> {
        if tiers.is_empty() {
            return Err(ValidationError::empty_field("backoff_secs"));
        }
        if tiers.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(ValidationError::invalid_format(
                "backoff_secs",
                "delays must not decrease",
            ));
        }
        Ok(Self {
            tiers: tiers.iter().copied().map(Duration::from_secs).collect(),
        })
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.tiers.len() - 1);
        self.tiers[index]
    }

    pub fn tiers(&self) -> &[Duration] {
        &self.tiers
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            tiers: Self::DEFAULT_TIERS_SECS
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}
