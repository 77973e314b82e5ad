//! Runtime configuration for the transfer service, read from the environment.
//!
//! | variable                          | default | meaning                                   |
//! |-----------------------------------|---------|-------------------------------------------|
//! | `STOCKMOVE_REQUEST_PREFIX`        | `TR`    | prefix of generated request numbers       |
//! | `STOCKMOVE_REQUIRE_RECEIPT_TOKEN` | `false` | refuse receipts without idempotency token |

use thiserror::Error;

pub const REQUEST_PREFIX_VAR: &str = "STOCKMOVE_REQUEST_PREFIX";
pub const REQUIRE_RECEIPT_TOKEN_VAR: &str = "STOCKMOVE_REQUIRE_RECEIPT_TOKEN";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub request_prefix: String,
    pub require_receipt_token: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            request_prefix: "TR".to_string(),
            require_receipt_token: false,
        }
    }
}

impl TransferConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(REQUEST_PREFIX_VAR) {
            let prefix = value.trim();
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid {
                    key: REQUEST_PREFIX_VAR,
                    value,
                    reason: "expected a non-empty alphanumeric prefix",
                });
            }
            config.request_prefix = prefix.to_string();
        }

        if let Some(value) = lookup(REQUIRE_RECEIPT_TOKEN_VAR) {
            config.require_receipt_token =
                value.trim().parse::<bool>().map_err(|_| ConfigError::Invalid {
                    key: REQUIRE_RECEIPT_TOKEN_VAR,
                    value: value.clone(),
                    reason: "expected true or false",
                })?;
        }

        Ok(config)
    }
}
