//! Per-request random values (`rnd`)
//!
//! The gateway only asks for a value that differs between requests. The
//! default source derives it from the local clock, so uniqueness is best
//! effort; a source can be injected to make signing reproducible.

use chrono::Local;

pub trait NonceSource: Send + Sync {
    fn next_nonce(&self) -> String;
}

/// Clock-derived nonce: local time down to microseconds, 20 digits
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockNonce;

impl NonceSource for ClockNonce {
    fn next_nonce(&self) -> String {
        Local::now().format("%Y%m%d%H%M%S%6f").to_string()
    }
}

/// Always returns the same value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedNonce(pub String);

impl FixedNonce {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl NonceSource for FixedNonce {
    fn next_nonce(&self) -> String {
        self.0.clone()
    }
}
