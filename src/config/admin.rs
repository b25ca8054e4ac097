//! Operator endpoint configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;

const MIN_TOKEN_LEN: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for `/admin/*`. Routes are not mounted without one.
    pub api_token: Option<Secret<String>>,
}

impl AdminConfig {
    pub fn token(&self) -> Option<Secret<String>> {
        self.api_token
            .as_ref()
            .filter(|t| !t.expose_secret().trim().is_empty())
            .cloned()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.token() {
            Some(token) if token.expose_secret().len() < MIN_TOKEN_LEN => {
                Err(ValidationError::AdminTokenTooShort(MIN_TOKEN_LEN))
            }
            _ => Ok(()),
        }
    }
}
