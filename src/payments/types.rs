//! 3-D Secure gateway types
//!
//! Value objects shared by every bank provider: the outbound gateway request,
//! the signed parameter set returned for the redirect, the inbound callback
//! form and the normalized verification result.

use crate::payments::error::{BuildError, BuildResult, FailureKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Keys of the per-bank static parameter bag
pub mod bank_keys {
    pub const CLIENT_ID: &str = "clientId";
    pub const PROCESS_TYPE: &str = "processType";
    pub const STORE_KEY: &str = "storeKey";
    pub const STORE_TYPE: &str = "storeType";
    pub const GATEWAY_URL: &str = "gatewayUrl";
    pub const VERIFY_URL: &str = "verifyUrl";
    pub const USER_NAME: &str = "userName";
    pub const PASSWORD: &str = "password";

    /// Values never written to logs or debug output
    pub const SECRET_KEYS: [&str; 2] = [STORE_KEY, PASSWORD];
}

/// Static bank configuration (client id, store key, gateway URL, ...)
///
/// Lookups are case-insensitive so the bag can be filled from sources that
/// normalize key case, such as environment variables.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankParameters(HashMap<String, String>);

impl BankParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-blank value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match self.0.get(key) {
            Some(value) => Some(value),
            None => self
                .0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
        };

        value.map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, key: &str) -> BuildResult<&str> {
        self.get(key)
            .ok_or_else(|| BuildError::configuration_missing(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BankParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for BankParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            let secret = bank_keys::SECRET_KEYS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(key));
            if secret {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// Card data collected on the merchant side
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub card_number: String,
    pub card_holder_name: String,
    /// Two digit month, e.g. "07"
    pub expire_month: String,
    /// Two digit year, e.g. "28"
    pub expire_year: String,
    pub cvv_code: String,
}

impl CardData {
    /// Card number with everything but the last four digits hidden
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(char::is_ascii_digit).collect();
        let visible = digits.len().saturating_sub(4);
        let tail: String = digits[visible..].iter().collect();
        format!("{}{}", "*".repeat(visible), tail)
    }
}

impl fmt::Debug for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardData")
            .field("card_number", &self.masked_number())
            .field("card_holder_name", &self.card_holder_name)
            .field("expire_month", &self.expire_month)
            .field("expire_year", &self.expire_year)
            .field("cvv_code", &"***")
            .finish()
    }
}

/// Card scheme, as far as the gateway's `cardType` field cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
}

impl CardBrand {
    /// Detect the scheme from the card number prefix
    pub fn detect(card_number: &str) -> Option<Self> {
        let digits: String = card_number.chars().filter(char::is_ascii_digit).collect();
        let prefix = |len: usize| digits.get(..len).and_then(|p| p.parse::<u32>().ok());

        if digits.starts_with('4') {
            Some(CardBrand::Visa)
        } else if matches!(prefix(2), Some(34 | 37)) {
            Some(CardBrand::Amex)
        } else if matches!(prefix(2), Some(51..=55)) || matches!(prefix(4), Some(2221..=2720)) {
            Some(CardBrand::Mastercard)
        } else {
            None
        }
    }

    /// Numeric code the gateway expects
    pub fn code(self) -> &'static str {
        match self {
            CardBrand::Visa => "1",
            CardBrand::Mastercard => "2",
            CardBrand::Amex => "3",
        }
    }
}

fn default_language() -> String {
    "tr".to_string()
}

/// Request for a 3-D Secure redirect to the bank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Merchant order number, sent as `oid`
    pub order_number: String,
    /// Total amount; its scale is kept when rendered (10.00 stays "10.00")
    pub total_amount: Decimal,
    /// ISO 4217 numeric code (TRY 949, EUR 978, USD 840)
    pub currency_iso_code: String,
    /// Installment count, 0 or 1 meaning a single payment
    #[serde(default)]
    pub installment: u32,
    /// Where the bank posts the callback, on success and on failure
    pub callback_url: String,
    /// Two letter language code for the bank page
    #[serde(default = "default_language")]
    pub language_iso_code: String,
    /// Card entered on the bank-hosted page instead of collected locally
    #[serde(default)]
    pub common_payment_page: bool,
    #[serde(default)]
    pub card: Option<CardData>,
    #[serde(default)]
    pub bank_parameters: BankParameters,
}

/// Signed form fields to post to the bank's gateway URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedParameters {
    pub gateway_url: String,
    pub fields: BTreeMap<String, String>,
}

impl SignedParameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn hash(&self) -> Option<&str> {
        self.get("hash")
    }
}

/// Context for verifying a callback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub bank_parameters: BankParameters,
}

/// A submitted form field, either once or repeated
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    One(String),
    Many(Vec<String>),
}

/// Form fields posted back by the bank
///
/// A field may be submitted more than once; scalar reads see the first value
/// and absent fields read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, FormValue>", into = "HashMap<String, Vec<String>>")]
pub struct CallbackForm {
    fields: HashMap<String, Vec<String>>,
}

impl CallbackForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    /// Replace every value of `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), vec![value.into()]);
    }

    pub fn value(&self, key: &str) -> &str {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The value of `key` only when exactly one was submitted
    pub fn single(&self, key: &str) -> Option<&str> {
        match self.fields.get(key).map(Vec::as_slice) {
            Some([value]) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Field names with their first value
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(key, values)| {
            (
                key.as_str(),
                values.first().map(String::as_str).unwrap_or(""),
            )
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackForm {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = CallbackForm::new();
        for (key, value) in iter {
            form.append(key, value);
        }
        form
    }
}

impl From<HashMap<String, FormValue>> for CallbackForm {
    fn from(raw: HashMap<String, FormValue>) -> Self {
        let fields = raw
            .into_iter()
            .map(|(key, value)| match value {
                FormValue::One(v) => (key, vec![v]),
                FormValue::Many(vs) => (key, vs),
            })
            .collect();
        Self { fields }
    }
}

impl From<CallbackForm> for HashMap<String, Vec<String>> {
    fn from(form: CallbackForm) -> Self {
        form.fields
    }
}

/// Outcome of a callback verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationResult {
    Success {
        transaction_id: String,
        auth_code: String,
        installment: u32,
        extra_installment: u32,
        /// Raw authorization response, e.g. "Approved"
        response: String,
        /// Raw `ProcReturnCode`
        return_code: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
        return_code: Option<String>,
    },
}

impl VerificationResult {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        VerificationResult::Failure {
            kind,
            message: message.into(),
            return_code: None,
        }
    }

    /// Failure carrying the bank's return code, dropped when blank
    pub fn failed_with_code(
        kind: FailureKind,
        message: impl Into<String>,
        return_code: &str,
    ) -> Self {
        VerificationResult::Failure {
            kind,
            message: message.into(),
            return_code: Some(return_code.to_string()).filter(|c| !c.is_empty()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            VerificationResult::Failure { kind, .. } => Some(*kind),
            VerificationResult::Success { .. } => None,
        }
    }
}
