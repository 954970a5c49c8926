//! Payment provider trait definitions
//!
//! Defines the contract every bank's 3-D Secure integration implements.

use crate::payments::error::BuildResult;
use crate::payments::types::{
    CallbackForm, GatewayRequest, SignedParameters, VerificationResult, VerifyRequest,
};

/// Trait for bank 3-D Secure integrations
///
/// Each bank owns its field names, field order and hash recipe. Callers pick
/// an implementation through configuration and only talk to this trait.
/// Both operations are pure and may be called concurrently.
pub trait PaymentProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Prepare the signed form that redirects the cardholder to the bank
    ///
    /// # Arguments
    /// * `request` - Order, amount, callback URL, card data and bank parameters
    ///
    /// # Returns
    /// * `SignedParameters` - Fields including `hash`, and the gateway URL to post them to
    fn build_gateway_request(&self, request: &GatewayRequest) -> BuildResult<SignedParameters>;

    /// Check the form the bank posted to the callback URL
    ///
    /// # Arguments
    /// * `verify_request` - Bank parameters holding the client id and store key
    /// * `gateway_request` - The request the redirect was built from
    /// * `form` - Posted form fields, `None` when nothing was received
    ///
    /// # Returns
    /// * `VerificationResult` - Success with transaction details, or the failure reason
    fn verify_callback(
        &self,
        verify_request: &VerifyRequest,
        gateway_request: &GatewayRequest,
        form: Option<&CallbackForm>,
    ) -> VerificationResult;
}
