//! NestPay 3-D Secure provider
//!
//! Integration with the NestPay (EST) virtual POS used by many Turkish banks.
//! The classic recipe signs a fixed sequence of fields with SHA-1; see
//! [`HashRecipe::NESTPAY`].

use std::collections::BTreeMap;
use std::iter;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::payments::error::{BuildError, BuildResult, FailureKind};
use crate::payments::nonce::{ClockNonce, NonceSource};
use crate::payments::signing::HashRecipe;
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    bank_keys, CallbackForm, CardBrand, GatewayRequest, SignedParameters, VerificationResult,
    VerifyRequest,
};

/// Outbound form field names
pub mod request_fields {
    pub const CLIENT_ID: &str = "clientid";
    pub const AMOUNT: &str = "amount";
    pub const ORDER_ID: &str = "oid";
    pub const OK_URL: &str = "okUrl";
    pub const FAIL_URL: &str = "failUrl";
    pub const PROCESS_TYPE: &str = "islemtipi";
    pub const NONCE: &str = "rnd";
    pub const INSTALLMENT: &str = "taksit";
    pub const HASH: &str = "hash";
    pub const CURRENCY: &str = "currency";
    pub const STORE_TYPE: &str = "storetype";
    pub const LANGUAGE: &str = "lang";
    pub const CARD_NUMBER: &str = "pan";
    pub const CARD_HOLDER: &str = "cardHolderName";
    pub const EXPIRE_MONTH: &str = "Ecom_Payment_Card_ExpDate_Month";
    pub const EXPIRE_YEAR: &str = "Ecom_Payment_Card_ExpDate_Year";
    pub const CVV: &str = "cv2";
    pub const CARD_TYPE: &str = "cardType";
}

/// Callback form field names
pub mod callback_fields {
    pub const MD_STATUS: &str = "mdStatus";
    pub const MD_ERROR_MSG: &str = "mdErrorMsg";
    pub const RESPONSE: &str = "Response";
    pub const ERR_MSG: &str = "ErrMsg";
    pub const ORDER_ID: &str = "oid";
    pub const AUTH_CODE: &str = "AuthCode";
    pub const PROC_RETURN_CODE: &str = "ProcReturnCode";
    pub const CAVV: &str = "cavv";
    pub const ECI: &str = "eci";
    pub const MD: &str = "md";
    pub const NONCE: &str = "rnd";
    pub const HASH: &str = "HASH";
    pub const INSTALLMENT: &str = "taksit";
    pub const EXTRA_INSTALLMENT: &str = "EXTRA.HOSTMSG";
    pub const TRANSACTION_ID: &str = "TransId";
}

/// `mdStatus` values meaning the cardholder passed 3-D authentication
pub const AUTHENTICATED_MD_STATUSES: [&str; 4] = ["1", "2", "3", "4"];

pub const APPROVED_RESPONSE: &str = "Approved";

/// Signed request fields in hash order; the store key follows the last one.
/// `okUrl` and `failUrl` both carry the callback URL.
pub const REQUEST_HASH_FIELDS: [&str; 8] = [
    request_fields::CLIENT_ID,
    request_fields::ORDER_ID,
    request_fields::AMOUNT,
    request_fields::OK_URL,
    request_fields::FAIL_URL,
    request_fields::PROCESS_TYPE,
    request_fields::INSTALLMENT,
    request_fields::NONCE,
];

/// Signed callback fields in hash order, after the configured client id
pub const CALLBACK_HASH_FIELDS: [&str; 9] = [
    callback_fields::ORDER_ID,
    callback_fields::AUTH_CODE,
    callback_fields::PROC_RETURN_CODE,
    callback_fields::RESPONSE,
    callback_fields::MD_STATUS,
    callback_fields::CAVV,
    callback_fields::ECI,
    callback_fields::MD,
    callback_fields::NONCE,
];

/// Request fields before signing, plus what is needed to sign them
pub(crate) struct PreparedRequest<'a> {
    pub fields: BTreeMap<String, String>,
    pub store_key: &'a str,
    pub gateway_url: &'a str,
}

impl PreparedRequest<'_> {
    /// Value of a field, "" when it was not emitted
    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn into_signed(mut self, hash: String) -> SignedParameters {
        self.fields.insert(request_fields::HASH.to_string(), hash);
        SignedParameters {
            gateway_url: self.gateway_url.to_string(),
            fields: self.fields,
        }
    }
}

/// Render the amount with `.` as decimal separator, keeping its scale
pub fn format_amount(amount: Decimal) -> BuildResult<String> {
    if amount <= Decimal::ZERO {
        return Err(BuildError::invalid_amount(
            amount.to_string(),
            "amount must be greater than zero",
        ));
    }
    Ok(amount.to_string())
}

/// Collect and validate the unsigned NestPay request fields
pub(crate) fn prepare_request<'a>(
    request: &'a GatewayRequest,
    nonce: String,
) -> BuildResult<PreparedRequest<'a>> {
    let params = &request.bank_parameters;
    let client_id = params.require(bank_keys::CLIENT_ID)?;
    let process_type = params.require(bank_keys::PROCESS_TYPE)?;
    let store_key = params.require(bank_keys::STORE_KEY)?;
    let store_type = params.require(bank_keys::STORE_TYPE)?;
    let gateway_url = params.require(bank_keys::GATEWAY_URL)?;

    if request.order_number.trim().is_empty() {
        return Err(BuildError::build_failed("order number is empty"));
    }
    if request.callback_url.trim().is_empty() {
        return Err(BuildError::build_failed("callback URL is empty"));
    }

    let amount = format_amount(request.total_amount)?;

    let mut fields = BTreeMap::new();
    let mut put = |name: &str, value: &str| {
        fields.insert(name.to_string(), value.to_string());
    };

    put(request_fields::CLIENT_ID, client_id);
    put(request_fields::AMOUNT, &amount);
    put(request_fields::ORDER_ID, &request.order_number);
    // Success and failure both land on the callback, which checks the outcome
    put(request_fields::OK_URL, &request.callback_url);
    put(request_fields::FAIL_URL, &request.callback_url);
    put(request_fields::PROCESS_TYPE, process_type);
    put(request_fields::NONCE, &nonce);

    if request.installment > 1 {
        put(request_fields::INSTALLMENT, &request.installment.to_string());
    }

    put(request_fields::CURRENCY, &request.currency_iso_code);

    if !request.common_payment_page {
        let card = request.card.as_ref().ok_or(BuildError::CardDataMissing)?;
        let card_type = CardBrand::detect(&card.card_number)
            .unwrap_or(CardBrand::Visa)
            .code();

        put(request_fields::CARD_NUMBER, &card.card_number);
        put(request_fields::CARD_HOLDER, &card.card_holder_name);
        put(request_fields::EXPIRE_MONTH, &card.expire_month);
        put(request_fields::EXPIRE_YEAR, &card.expire_year);
        put(request_fields::CVV, &card.cvv_code);
        put(request_fields::CARD_TYPE, card_type);
    }

    put(request_fields::STORE_TYPE, store_type);
    put(request_fields::LANGUAGE, &request.language_iso_code);

    Ok(PreparedRequest {
        fields,
        store_key,
        gateway_url,
    })
}

/// Status checks shared by the NestPay recipes, in protocol order
///
/// Returns the form when the cardholder authenticated and the bank approved.
pub(crate) fn check_authorization<'f>(
    provider: &str,
    form: Option<&'f CallbackForm>,
) -> Result<&'f CallbackForm, VerificationResult> {
    use callback_fields::*;

    let Some(form) = form else {
        warn!(provider, "Callback arrived without form data");
        return Err(VerificationResult::failed(
            FailureKind::FormMissing,
            "no form data",
        ));
    };

    let order_id = form.value(ORDER_ID);
    let return_code = form.value(PROC_RETURN_CODE);
    let md_status = form.value(MD_STATUS);

    if md_status.is_empty() {
        warn!(provider, order_id, return_code, "Callback has no mdStatus");
        let message = match form.value(MD_ERROR_MSG) {
            "" => "3-D status missing",
            bank_message => bank_message,
        };
        return Err(VerificationResult::failed_with_code(
            FailureKind::StatusAbsent,
            message,
            return_code,
        ));
    }

    let response = form.value(RESPONSE);

    if !AUTHENTICATED_MD_STATUSES.contains(&md_status) {
        warn!(provider, order_id, md_status, return_code, "3-D authentication failed");
        return Err(VerificationResult::failed_with_code(
            FailureKind::StatusNotAuthenticated,
            format!("{} - {}", response, form.value(MD_ERROR_MSG)),
            return_code,
        ));
    }

    if response != APPROVED_RESPONSE {
        warn!(provider, order_id, response, return_code, "Payment not approved");
        return Err(VerificationResult::failed_with_code(
            FailureKind::ResponseNotApproved,
            format!("{} - {}", response, form.value(ERR_MSG)),
            return_code,
        ));
    }

    Ok(form)
}

/// Client id and store key from the verify request
pub(crate) fn verify_credentials<'v>(
    verify_request: &'v VerifyRequest,
    form: &CallbackForm,
) -> Result<(&'v str, &'v str), VerificationResult> {
    let params = &verify_request.bank_parameters;
    let require = |key: &str| {
        params.get(key).ok_or_else(|| {
            VerificationResult::failed_with_code(
                FailureKind::ConfigurationMissing,
                format!("bank parameter '{}' is not configured", key),
                form.value(callback_fields::PROC_RETURN_CODE),
            )
        })
    };

    Ok((require(bank_keys::CLIENT_ID)?, require(bank_keys::STORE_KEY)?))
}

/// Lenient count parsing; anything unparsable counts as zero
fn parse_count(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

/// Failure for a callback whose signature does not match
pub(crate) fn signature_invalid(form: &CallbackForm) -> VerificationResult {
    VerificationResult::failed_with_code(
        FailureKind::SignatureInvalid,
        "signature invalid",
        form.value(callback_fields::PROC_RETURN_CODE),
    )
}

/// Success result from an authorized, signature-checked callback
pub(crate) fn approved_result(form: &CallbackForm) -> VerificationResult {
    use callback_fields::*;

    // The bank's transaction id is reported as the auth code too
    let transaction_id = form.value(TRANSACTION_ID).to_string();

    VerificationResult::Success {
        auth_code: transaction_id.clone(),
        transaction_id,
        installment: parse_count(form.value(INSTALLMENT)),
        extra_installment: parse_count(form.value(EXTRA_INSTALLMENT)),
        response: form.value(RESPONSE).to_string(),
        return_code: form.value(PROC_RETURN_CODE).to_string(),
    }
}

/// NestPay provider with the classic SHA-1 hash
#[derive(Clone)]
pub struct NestPayProvider {
    nonce_source: Arc<dyn NonceSource>,
}

impl Default for NestPayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NestPayProvider {
    pub fn new() -> Self {
        Self::with_nonce_source(ClockNonce)
    }

    pub fn with_nonce_source(nonce_source: impl NonceSource + 'static) -> Self {
        Self {
            nonce_source: Arc::new(nonce_source),
        }
    }
}

impl PaymentProvider for NestPayProvider {
    fn name(&self) -> &'static str {
        "NestPay"
    }

    fn build_gateway_request(&self, request: &GatewayRequest) -> BuildResult<SignedParameters> {
        info!(
            provider = self.name(),
            order_number = %request.order_number,
            installment = request.installment,
            common_payment_page = request.common_payment_page,
            "Building 3-D gateway request"
        );

        let prepared = prepare_request(request, self.nonce_source.next_nonce())?;
        let hash = HashRecipe::NESTPAY.sign(
            REQUEST_HASH_FIELDS.iter().map(|name| prepared.value(name)),
            prepared.store_key,
        );

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
        let (client_id, store_key) = match verify_credentials(verify_request, form) {
            Ok(credentials) => credentials,
            Err(failure) => return failure,
        };

        let values = iter::once(client_id)
            .chain(CALLBACK_HASH_FIELDS.iter().map(|name| form.value(name)));

        if !HashRecipe::NESTPAY.verify(values, store_key, form.single(callback_fields::HASH)) {
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
