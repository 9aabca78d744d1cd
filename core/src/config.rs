//! Connection settings supplied by the embedding application.

use tracing::debug;

use crate::error::{ApiError, Result};

pub const API_KEY_VAR: &str = "SHLINK_API_KEY";
pub const API_URL_VAR: &str = "SHLINK_API_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Read `SHLINK_API_KEY` and `SHLINK_API_URL`, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", path.display());
        }
        Ok(Self {
            api_key: required_var(API_KEY_VAR)?,
            base_url: required_var(API_URL_VAR)?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::Config(format!("{name} environment variable not set"))),
    }
}
