//! 3-D Secure payment provider module
//!
//! Signing of gateway redirects and verification of bank callbacks behind a
//! single provider trait, one implementation per bank protocol.

pub mod error;
pub mod nonce;
pub mod providers;
pub mod signing;
pub mod traits;
pub mod types;

pub use error::{BuildError, BuildResult, FailureKind};
pub use providers::ProviderKind;
pub use traits::PaymentProvider;
pub use types::{
    BankParameters, CallbackForm, CardData, GatewayRequest, SignedParameters, VerificationResult,
    VerifyRequest,
};
