//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait, one per bank protocol.

pub mod nestpay;
pub mod nestpay_v3;

pub use nestpay::NestPayProvider;
pub use nestpay_v3::NestPayV3Provider;

use crate::payments::error::UnknownProvider;
use crate::payments::traits::PaymentProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider selected through configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "nestpay")]
    NestPay,
    #[serde(rename = "nestpay_v3")]
    NestPayV3,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::NestPay => "nestpay",
            ProviderKind::NestPayV3 => "nestpay_v3",
        }
    }

    /// Provider instance with the clock-derived nonce source
    pub fn provider(self) -> Box<dyn PaymentProvider> {
        match self {
            ProviderKind::NestPay => Box::new(NestPayProvider::new()),
            ProviderKind::NestPayV3 => Box::new(NestPayV3Provider::new()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nestpay" => Ok(ProviderKind::NestPay),
            "nestpay_v3" | "nestpay-v3" => Ok(ProviderKind::NestPayV3),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("nestpay".parse::<ProviderKind>(), Ok(ProviderKind::NestPay));
        assert_eq!("NestPay_V3".parse::<ProviderKind>(), Ok(ProviderKind::NestPayV3));
        assert_eq!(
            "garanti".parse::<ProviderKind>(),
            Err(UnknownProvider("garanti".to_string()))
        );
    }

    #[test]
    fn test_provider_kind_selects_implementation() {
        assert_eq!(ProviderKind::NestPay.provider().name(), "NestPay");
        assert_eq!(ProviderKind::NestPayV3.provider().name(), "NestPayV3");
    }

    #[test]
    fn test_provider_kind_serde_names_match_display() {
        for kind in [ProviderKind::NestPay, ProviderKind::NestPayV3] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
