use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while preparing a signed gateway request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Bank parameter '{key}' is not configured")]
    ConfigurationMissing { key: String },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Card data is required when the card is not entered on the bank payment page")]
    CardDataMissing,

    #[error("Gateway request could not be built: {message}")]
    BuildFailed { message: String },
}

impl BuildError {
    pub fn configuration_missing(key: impl Into<String>) -> Self {
        Self::ConfigurationMissing { key: key.into() }
    }

    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        }
    }

    pub fn build_failed(message: impl Into<String>) -> Self {
        Self::BuildFailed {
            message: message.into(),
        }
    }
}

/// Reason a bank callback was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No form payload reached the verifier
    FormMissing,
    /// The 3-D status indicator was absent or empty
    StatusAbsent,
    /// The 3-D status indicator is not one of the authenticated codes
    StatusNotAuthenticated,
    /// The authorization response is not the approved token
    ResponseNotApproved,
    /// The recomputed hash differs from the one the bank sent
    SignatureInvalid,
    /// Client id or store key missing from the bank parameters
    ConfigurationMissing,
}

impl FailureKind {
    /// Rejections that indicate a forged or corrupted callback
    pub fn is_security_rejection(&self) -> bool {
        matches!(self, FailureKind::SignatureInvalid)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::FormMissing => "form missing",
            FailureKind::StatusAbsent => "3-D status absent",
            FailureKind::StatusNotAuthenticated => "3-D authentication failed",
            FailureKind::ResponseNotApproved => "response not approved",
            FailureKind::SignatureInvalid => "signature invalid",
            FailureKind::ConfigurationMissing => "configuration missing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown payment provider: {0}")]
pub struct UnknownProvider(pub String);
