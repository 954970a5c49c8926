use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::payments::providers::ProviderKind;
use crate::payments::types::{bank_keys, BankParameters};

/// Bank parameters every provider needs to sign a request
pub const REQUIRED_BANK_KEYS: [&str; 5] = [
    bank_keys::CLIENT_ID,
    bank_keys::PROCESS_TYPE,
    bank_keys::STORE_KEY,
    bank_keys::STORE_TYPE,
    bank_keys::GATEWAY_URL,
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderKind,
    #[serde(default)]
    pub bank: BankParameters,
}

impl Settings {
    /// Load settings from an optional file, then `GATEWAY_` environment variables
    ///
    /// Nested keys use `__`, e.g. `GATEWAY_BANK__STOREKEY`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()
            .context("Failed to read gateway settings")?
            .try_deserialize()
            .context("Gateway settings are malformed")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_BANK_KEYS
            .iter()
            .copied()
            .filter(|key| self.bank.get(key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(anyhow!(
                "Bank parameters missing for {}: {}",
                self.provider,
                missing.join(", ")
            ));
        }

        let gateway_url = self.bank.get(bank_keys::GATEWAY_URL).unwrap_or_default();
        if !gateway_url.starts_with("https://") && !gateway_url.starts_with("http://") {
            return Err(anyhow!(
                "gatewayUrl must be an http(s) URL, got {}",
                gateway_url
            ));
        }

        Ok(())
    }
}
