//! 3-D Secure payment gateway adapter
//!
//! Builds signed redirect forms for a bank's 3-D Secure page and verifies the
//! callbacks the bank posts back. Transport, persistence and rendering are
//! left to the caller; everything here is a pure function of its inputs.

pub mod config;
pub mod payments;

pub use payments::{
    BankParameters, BuildError, CallbackForm, FailureKind, GatewayRequest, PaymentProvider,
    ProviderKind, SignedParameters, VerificationResult, VerifyRequest,
};
