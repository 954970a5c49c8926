//! NestPay provider with hash version 3
//!
//! Same request and callback fields as the classic integration, but the hash
//! covers every posted field: names sorted case-insensitively, values escaped
//! and joined with `|`, store key last, SHA-512. The request announces the
//! recipe with `hashAlgorithm=ver3`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::payments::error::BuildResult;
use crate::payments::nonce::{ClockNonce, NonceSource};
use crate::payments::providers::nestpay::{
    approved_result, callback_fields, check_authorization, prepare_request, signature_invalid,
    verify_credentials,
};
use crate::payments::signing::HashRecipe;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    CallbackForm, GatewayRequest, SignedParameters, VerificationResult, VerifyRequest,
};

pub const HASH_ALGORITHM_FIELD: &str = "hashAlgorithm";
pub const HASH_ALGORITHM_VER3: &str = "ver3";

/// Fields never covered by the hash
const UNSIGNED_FIELDS: [&str; 2] = ["hash", "encoding"];

/// Field values ordered by case-insensitive field name, unsigned fields skipped
pub fn hash_values<'a, I>(fields: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut signed: Vec<(&str, &str)> = fields
        .into_iter()
        .filter(|(name, _)| {
            !UNSIGNED_FIELDS
                .iter()
                .any(|unsigned| unsigned.eq_ignore_ascii_case(name))
        })
        .collect();
    signed.sort_by(|(a, _), (b, _)| {
        a.to_ascii_lowercase()
            .cmp(&b.to_ascii_lowercase())
            .then_with(|| a.cmp(b))
    });
    signed.into_iter().map(|(_, value)| value).collect()
}

/// NestPay provider signing with hash version 3
#[derive(Clone)]
pub struct NestPayV3Provider {
    nonce_source: Arc<dyn NonceSource>,
}

impl Default for NestPayV3Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl NestPayV3Provider {
    pub fn new() -> Self {
        Self::with_nonce_source(ClockNonce)
    }

    pub fn with_nonce_source(nonce_source: impl NonceSource + 'static) -> Self {
        Self {
            nonce_source: Arc::new(nonce_source),
        }
    }
}

impl PaymentProvider for NestPayV3Provider {
    fn name(&self) -> &'static str {
        "NestPayV3"
    }

    fn build_gateway_request(&self, request: &GatewayRequest) -> BuildResult<SignedParameters> {
        info!(
            provider = self.name(),
            order_number = %request.order_number,
            installment = request.installment,
            common_payment_page = request.common_payment_page,
            "Building 3-D gateway request"
        );

        let mut prepared = prepare_request(request, self.nonce_source.next_nonce())?;
        prepared
            .fields
            .insert(HASH_ALGORITHM_FIELD.to_string(), HASH_ALGORITHM_VER3.to_string());

        let values = hash_values(
            prepared
                .fields
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        let hash = HashRecipe::NESTPAY_VER3.sign(values, prepared.store_key);

        Ok(prepared.into_signed(hash))
    }

    fn verify_callback(
        &self,
        verify_request: &VerifyRequest,
        _gateway_request: &GatewayRequest,
        form: Option<&CallbackForm>,
    ) -> VerificationResult {
        let form = match check_authorization(self.name(), form) {
            Ok(form) => form,
            Err(failure) => return failure,
        };
        let (_, store_key) = match verify_credentials(verify_request, form) {
            Ok(credentials) => credentials,
            Err(failure) => return failure,
        };

        let values = hash_values(form.iter());
        if !HashRecipe::NESTPAY_VER3.verify(values, store_key, form.single(callback_fields::HASH)) {
            warn!(
                provider = self.name(),
                order_id = form.value(callback_fields::ORDER_ID),
                "Callback signature mismatch"
            );
            return signature_invalid(form);
        }

        info!(
            provider = self.name(),
            order_id = form.value(callback_fields::ORDER_ID),
            return_code = form.value(callback_fields::PROC_RETURN_CODE),
            "Callback verified"
        );
        approved_result(form)
    }
}
