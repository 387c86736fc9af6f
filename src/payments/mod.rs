//! # Payments Module
//!
//! Seam between the shop and the crypto payment processor.
//!
//! - [`PaymentGateway`]: the three outbound calls the shop makes
//! - [`nowpayments`]: HTTP client for a NOWPayments-compatible API
//! - [`ipn`]: verification and handling of the provider's payment callbacks

pub mod ipn;
pub mod nowpayments;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::ProviderError;

/// Invoice request for one order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    /// Base currency the price is expressed in
    pub price_currency: String,
    /// Currency the buyer pays in
    pub pay_currency: String,
    pub order_id: Uuid,
    pub order_description: String,
    pub ipn_callback_url: String,
}

/// What the buyer needs to pay
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentInvoice {
    #[serde(deserialize_with = "lenient_string")]
    pub payment_id: String,
    pub pay_address: String,
    #[serde(deserialize_with = "lenient_decimal")]
    pub pay_amount: Decimal,
    pub pay_currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequest {
    pub address: String,
    pub currency: String,
    pub amount: Decimal,
    pub order_id: Uuid,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Currency tickers the provider accepts, lowercase
    async fn available_currencies(&self) -> Result<Vec<String>, ProviderError>;

    async fn create_payment(&self, request: &PaymentRequest)
        -> Result<PaymentInvoice, ProviderError>;

    async fn create_payout(&self, request: &PayoutRequest) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    String(String),
}

/// Provider amounts arrive either as JSON numbers or as strings
pub(crate) fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    };
    parse_amount(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn lenient_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<NumberOrString>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrString::Number(n)) => n.to_string(),
        Some(NumberOrString::String(s)) => s,
    };
    parse_amount(&raw).map(Some).map_err(serde::de::Error::custom)
}

/// Ids are numbers in some responses and strings in others
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    })
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    raw.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| format!("invalid amount {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invoice_accepts_numeric_and_string_amounts() {
        let numeric: PaymentInvoice = serde_json::from_value(serde_json::json!({
            "payment_id": 5745459419_u64,
            "pay_address": "3EZ2uTdVDAMFXTfc6uLDDKR6o8qKBZXVkj",
            "pay_amount": 0.00123,
            "pay_currency": "btc"
        }))
        .unwrap();
        assert_eq!(numeric.payment_id, "5745459419");
        assert_eq!(numeric.pay_amount, dec!(0.00123));

        let string: PaymentInvoice = serde_json::from_value(serde_json::json!({
            "payment_id": "abc",
            "pay_address": "addr",
            "pay_amount": "12.5",
            "pay_currency": "ltc"
        }))
        .unwrap();
        assert_eq!(string.pay_amount, dec!(12.5));
    }

    #[test]
    fn test_scientific_amount() {
        assert_eq!(parse_amount("1e-5").unwrap(), dec!(0.00001));
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_payment_request_serializes_price_as_number() {
        let request = PaymentRequest {
            price_amount: dec!(45),
            price_currency: "usd".to_string(),
            pay_currency: "btc".to_string(),
            order_id: Uuid::nil(),
            order_description: "2x A (Standard)".to_string(),
            ipn_callback_url: "https://shop.example/webhook/payments".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["price_amount"], serde_json::json!(45.0));
        assert_eq!(value["order_id"], serde_json::json!(Uuid::nil().to_string()));
    }
}
