//! End-to-end tests for the NestPay 3-D Secure flow
//!
//! Build a redirect, then verify the callback the bank would post for it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_decimal::Decimal;
use sha1::{Digest, Sha1};
use std::str::FromStr;

use threeds_gateway::payments::nonce::FixedNonce;
use threeds_gateway::payments::providers::{NestPayProvider, NestPayV3Provider};
use threeds_gateway::payments::types::bank_keys;
use threeds_gateway::{
    BankParameters, CallbackForm, FailureKind, GatewayRequest, PaymentProvider, ProviderKind,
    SignedParameters, VerificationResult, VerifyRequest,
};

const NONCE: &str = "20261016120000000001";
const STORE_KEY: &str = "TRPS0200";

fn sandbox_bank() -> BankParameters {
    BankParameters::new()
        .with(bank_keys::CLIENT_ID, "700655000200")
        .with(bank_keys::PROCESS_TYPE, "Auth")
        .with(bank_keys::STORE_KEY, STORE_KEY)
        .with(bank_keys::STORE_TYPE, "3D_PAY")
        .with(
            bank_keys::GATEWAY_URL,
            "https://entegrasyon.asseco-see.com.tr/fim/est3Dgate",
        )
}

fn order_request() -> GatewayRequest {
    GatewayRequest {
        order_number: "ORD1".to_string(),
        total_amount: Decimal::from_str("10.00").unwrap(),
        currency_iso_code: "949".to_string(),
        installment: 1,
        callback_url: "https://x/cb".to_string(),
        language_iso_code: "tr".to_string(),
        common_payment_page: true,
        card: None,
        bank_parameters: sandbox_bank(),
    }
}

fn sha1_base64(message: &str) -> String {
    STANDARD.encode(Sha1::digest(message.as_bytes()))
}

/// Canonical request string rebuilt from the emitted fields
fn recompute_request_hash(signed: &SignedParameters) -> String {
    let field = |name: &str| signed.get(name).unwrap_or("").to_string();
    let canonical = [
        field("clientid"),
        field("oid"),
        field("amount"),
        field("okUrl"),
        field("failUrl"),
        field("islemtipi"),
        field("taksit"),
        field("rnd"),
        STORE_KEY.to_string(),
    ]
    .concat();
    sha1_base64(&canonical)
}

fn sign(request: &GatewayRequest, nonce: &str) -> SignedParameters {
    NestPayProvider::with_nonce_source(FixedNonce::new(nonce))
        .build_gateway_request(request)
        .expect("request should build")
}

fn approved_callback() -> CallbackForm {
    [
        ("mdStatus", "1"),
        ("Response", "Approved"),
        ("oid", "ORD1"),
        ("AuthCode", "123456"),
        ("ProcReturnCode", "00"),
        ("cavv", "AAABBBCCC"),
        ("eci", "05"),
        ("md", "md-token"),
        ("rnd", NONCE),
        ("TransId", "TX-42"),
        ("HASH", "vP4p7IIvCTp3C3xHbrunNeFyhGk="),
    ]
    .into_iter()
    .collect()
}

fn verify_with(provider: &dyn PaymentProvider, form: &CallbackForm) -> VerificationResult {
    let verify_request = VerifyRequest {
        bank_parameters: sandbox_bank(),
    };
    provider.verify_callback(&verify_request, &order_request(), Some(form))
}

#[test]
fn test_single_payment_request_matches_known_hash() {
    let signed = sign(&order_request(), NONCE);

    assert_eq!(signed.get("clientid"), Some("700655000200"));
    assert_eq!(signed.get("amount"), Some("10.00"));
    assert_eq!(signed.get("taksit"), None);
    assert_eq!(signed.hash(), Some("7dmYWsamkreLzKLfg0eELktbRs0="));
    assert_eq!(signed.hash(), Some(recompute_request_hash(&signed).as_str()));
}

#[test]
fn test_request_hash_is_deterministic() {
    let mut request = order_request();
    request.installment = 9;

    let first = sign(&request, NONCE);
    let second = sign(&request, NONCE);

    assert_eq!(first, second);
    assert_eq!(first.hash(), Some(recompute_request_hash(&first).as_str()));
}

#[test]
fn test_request_hash_changes_with_each_signed_field() {
    let baseline = sign(&order_request(), NONCE);

    let mut amount = order_request();
    amount.total_amount = Decimal::from_str("10.01").unwrap();

    let mut order = order_request();
    order.order_number = "ORD2".to_string();

    let mut callback = order_request();
    callback.callback_url = "https://x/cb2".to_string();

    let mut installment = order_request();
    installment.installment = 2;

    let variants = [
        sign(&amount, NONCE),
        sign(&order, NONCE),
        sign(&callback, NONCE),
        sign(&installment, NONCE),
        sign(&order_request(), "20261016120000000002"),
    ];

    for variant in &variants {
        assert_ne!(variant.hash(), baseline.hash());
        assert_eq!(variant.hash(), Some(recompute_request_hash(variant).as_str()));
    }
}

#[test]
fn test_approved_callback_verifies() {
    let result = verify_with(&NestPayProvider::new(), &approved_callback());

    match result {
        VerificationResult::Success {
            transaction_id,
            auth_code,
            response,
            return_code,
            ..
        } => {
            assert_eq!(transaction_id, "TX-42");
            assert_eq!(auth_code, "TX-42");
            assert_eq!(response, "Approved");
            assert_eq!(return_code, "00");
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn test_callback_with_altered_hash_is_rejected() {
    let mut form = approved_callback();
    form.set("HASH", "vP4p7IIvCTp3C3xHbrunNeFyhGK=");

    let result = verify_with(&NestPayProvider::new(), &form);
    assert_eq!(result.failure_kind(), Some(FailureKind::SignatureInvalid));
    assert!(result
        .failure_kind()
        .is_some_and(|kind| kind.is_security_rejection()));

    // The bank's return code survives a signature rejection
    match result {
        VerificationResult::Failure { return_code, .. } => {
            assert_eq!(return_code.as_deref(), Some("00"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_callback_with_lowercased_hash_is_rejected() {
    let mut form = approved_callback();
    form.set("HASH", "vp4p7iivctp3c3xhbrunnefyhgk=");

    let result = verify_with(&NestPayProvider::new(), &form);
    assert_eq!(result.failure_kind(), Some(FailureKind::SignatureInvalid));
}

#[test]
fn test_callback_status_failures_keep_bank_diagnostics() {
    let mut absent = approved_callback();
    absent.set("mdStatus", "");
    absent.set("mdErrorMsg", "Card not enrolled");
    absent.set("ProcReturnCode", "99");

    assert_eq!(
        verify_with(&NestPayProvider::new(), &absent),
        VerificationResult::Failure {
            kind: FailureKind::StatusAbsent,
            message: "Card not enrolled".to_string(),
            return_code: Some("99".to_string()),
        }
    );

    let mut declined = approved_callback();
    declined.set("Response", "Error");
    declined.set("ErrMsg", "Do not honour");

    assert_eq!(
        verify_with(&NestPayProvider::new(), &declined).failure_kind(),
        Some(FailureKind::ResponseNotApproved)
    );
}

#[test]
fn test_callback_with_any_md_status_outside_one_to_four_fails() {
    for status in ["0", "5", "6", "7", "8", "9"] {
        let mut form = approved_callback();
        form.set("mdStatus", status);
        assert_eq!(
            verify_with(&NestPayProvider::new(), &form).failure_kind(),
            Some(FailureKind::StatusNotAuthenticated),
            "mdStatus {}",
            status
        );
    }
}

#[test]
fn test_providers_are_selected_by_kind() {
    let provider = ProviderKind::NestPay.provider();
    assert!(verify_with(provider.as_ref(), &approved_callback()).is_success());

    // A classic hash does not satisfy the version 3 recipe
    let v3 = NestPayV3Provider::with_nonce_source(FixedNonce::new(NONCE));
    assert_eq!(
        verify_with(&v3, &approved_callback()).failure_kind(),
        Some(FailureKind::SignatureInvalid)
    );
}

#[test]
fn test_provider_is_shareable_across_threads() {
    let provider = std::sync::Arc::new(NestPayProvider::with_nonce_source(FixedNonce::new(NONCE)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let provider = provider.clone();
            std::thread::spawn(move || {
                provider
                    .build_gateway_request(&order_request())
                    .map(|signed| signed.hash().map(str::to_string))
            })
        })
        .collect();

    for handle in handles {
        let hash = handle.join().unwrap().unwrap();
        assert_eq!(hash.as_deref(), Some("7dmYWsamkreLzKLfg0eELktbRs0="));
    }
}
