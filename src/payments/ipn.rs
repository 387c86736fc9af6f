//! Instant payment notifications from the provider.
//!
//! A callback is trusted only if `HMAC-SHA512(secret, canonical_json(body))`
//! matches the hex signature header. Canonical JSON has object keys sorted
//! at every level and no insignificant whitespace.
//!
//! Once trusted, the event is applied with a compare-and-set from
//! `awaiting_payment`, so retried or concurrent deliveries of the same event
//! change the order at most once.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha512;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bot::outbox::BotCommand;
use crate::bot::ui_builder;
use crate::errors::{IpnError, ShopError};
use crate::localization::{t_args_lang, t_lang};
use crate::order_lifecycle::OrderStatus;
use crate::payments::{lenient_optional_decimal, lenient_string};
use crate::shop_model::{Bot, Order, OrderUpdate};
use crate::store::ShopStore;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_HEADER: &str = "x-signature";
/// Header name used by NOWPayments itself
pub const SIGNATURE_HEADER_ALIAS: &str = "x-nowpayments-sig";

/// Rebuild `value` with object keys sorted recursively
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Sorted-key, compact serialization
pub fn canonical_json(value: &Value) -> Vec<u8> {
    // serializing a Value cannot fail: keys are strings
    serde_json::to_vec(&canonicalize(value)).unwrap_or_default()
}

fn mac(secret: &str) -> Result<HmacSha512, IpnError> {
    HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| IpnError::MissingSecret)
}

/// Hex signature of `value`, as the provider computes it
pub fn sign(secret: &str, value: &Value) -> Result<String, IpnError> {
    let mut mac = mac(secret)?;
    mac.update(&canonical_json(value));
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a raw callback body and return it parsed. Fails closed.
pub fn verify_ipn(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Value, IpnError> {
    let secret = secret.filter(|s| !s.is_empty()).ok_or(IpnError::MissingSecret)?;
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(IpnError::MissingSignature)?;
    let expected = hex::decode(signature).map_err(|_| IpnError::InvalidSignature)?;
    let value: Value =
        serde_json::from_slice(body).map_err(|e| IpnError::Payload(e.to_string()))?;

    let mut mac = mac(secret)?;
    mac.update(&canonical_json(&value));
    mac.verify_slice(&expected)
        .map_err(|_| IpnError::InvalidSignature)?;
    Ok(value)
}

/// Provider-side payment lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    Other(String),
}

impl From<String> for PaymentStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "waiting" => PaymentStatus::Waiting,
            "confirming" => PaymentStatus::Confirming,
            "confirmed" => PaymentStatus::Confirmed,
            "sending" => PaymentStatus::Sending,
            "partially_paid" => PaymentStatus::PartiallyPaid,
            "finished" => PaymentStatus::Finished,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "expired" => PaymentStatus::Expired,
            _ => PaymentStatus::Other(raw),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Waiting => "waiting",
            PaymentStatus::Confirming => "confirming",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Sending => "sending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Finished => "finished",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Other(raw) => raw,
        };
        f.write_str(s)
    }
}

/// The fields of a callback the shop acts on
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentEvent {
    #[serde(deserialize_with = "lenient_string")]
    pub order_id: String,
    pub payment_status: PaymentStatus,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub pay_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_optional_decimal")]
    pub price_amount: Option<Decimal>,
    #[serde(default)]
    pub pay_currency: Option<String>,
}

impl PaymentEvent {
    pub fn from_value(value: Value) -> Result<Self, IpnError> {
        serde_json::from_value(value).map_err(|e| IpnError::Payload(e.to_string()))
    }
}

/// What a payment event means for its order
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Paid in full: collect the shipping address next
    Confirmed,
    Underpaid { shortfall: Decimal },
    Overpaid { excess: Decimal },
    Failed,
    /// Not a final event, or not enough data to decide
    NoChange,
}

impl Reconciliation {
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            Reconciliation::Confirmed => Some(OrderStatus::AwaitingAddress),
            Reconciliation::Underpaid { .. } => Some(OrderStatus::Underpaid),
            Reconciliation::Overpaid { .. } => Some(OrderStatus::Overpaid),
            Reconciliation::Failed => Some(OrderStatus::Failed),
            Reconciliation::NoChange => None,
        }
    }
}

/// Decide the outcome of `event`. Amounts are compared after rounding both
/// half-to-even at `scale` decimal places.
pub fn reconcile(event: &PaymentEvent, scale: u32) -> Reconciliation {
    match event.payment_status {
        PaymentStatus::Finished => {
            let (Some(paid), Some(expected)) = (event.pay_amount, event.price_amount) else {
                warn!(order_id = %event.order_id, "Finished payment without amounts");
                return Reconciliation::NoChange;
            };
            let paid = paid.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
            let expected =
                expected.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
            match paid.cmp(&expected) {
                std::cmp::Ordering::Less => Reconciliation::Underpaid {
                    shortfall: expected - paid,
                },
                std::cmp::Ordering::Greater => Reconciliation::Overpaid {
                    excess: paid - expected,
                },
                std::cmp::Ordering::Equal => Reconciliation::Confirmed,
            }
        }
        PaymentStatus::Failed | PaymentStatus::Refunded | PaymentStatus::Expired => {
            Reconciliation::Failed
        }
        _ => Reconciliation::NoChange,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IpnOutcome {
    /// Unknown order, or an order no longer awaiting payment
    Ignored { reason: &'static str },
    /// Valid event that does not move the order
    Unchanged { order_id: Uuid },
    Applied {
        order: Order,
        /// Bot to notify the buyer through; `None` if it was deleted
        bot: Option<Bot>,
        commands: Vec<BotCommand>,
    },
}

/// Applies verified payment events to orders
pub struct PaymentConfirmationHandler {
    store: Arc<dyn ShopStore>,
    amount_scale: u32,
}

impl PaymentConfirmationHandler {
    pub fn new(store: Arc<dyn ShopStore>, amount_scale: u32) -> Self {
        Self {
            store,
            amount_scale,
        }
    }

    pub async fn handle(&self, event: &PaymentEvent) -> Result<IpnOutcome, ShopError> {
        let Ok(order_id) = Uuid::parse_str(event.order_id.trim()) else {
            debug!(order_id = %event.order_id, "IPN for a non-shop order id");
            return Ok(IpnOutcome::Ignored {
                reason: "unknown order",
            });
        };
        let Some(order) = self.store.order(order_id).await? else {
            debug!(order_id = %order_id, "IPN for an unknown order");
            return Ok(IpnOutcome::Ignored {
                reason: "unknown order",
            });
        };
        if order.status != OrderStatus::AwaitingPayment {
            debug!(order_id = %order_id, status = %order.status, "IPN for an order already settled");
            return Ok(IpnOutcome::Ignored {
                reason: "already processed",
            });
        }

        let reconciliation = reconcile(event, self.amount_scale);
        let Some(target) = reconciliation.target_status() else {
            debug!(order_id = %order_id, payment_status = %event.payment_status, "IPN without status change");
            return Ok(IpnOutcome::Unchanged { order_id });
        };
        let target = order.status.transition(target)?;

        let applied = self
            .store
            .transition_order(order_id, OrderStatus::AwaitingPayment, target, OrderUpdate::default())
            .await?;
        if !applied {
            info!(order_id = %order_id, "IPN lost the race to a concurrent delivery");
            return Ok(IpnOutcome::Ignored {
                reason: "already processed",
            });
        }
        info!(order_id = %order_id, payment_status = %event.payment_status, status = %target, "Order payment reconciled");

        let order = Order {
            status: target,
            ..order
        };
        let bot = self.store.bot(order.bot_id).await?;
        let commands = buyer_notice(&order, &reconciliation).into_iter().collect();

        Ok(IpnOutcome::Applied {
            order,
            bot,
            commands,
        })
    }
}

/// Message to the buyer for a reconciled order, if one is sent
fn buyer_notice(order: &Order, reconciliation: &Reconciliation) -> Option<BotCommand> {
    let lang = order.language_code.as_deref();
    let short_id = order.short_id();
    let text = match reconciliation {
        Reconciliation::Confirmed => format!(
            "{}\n\n{}",
            t_args_lang("payment-confirmed", &[("order", &short_id)], lang),
            t_lang("ask-address", lang)
        ),
        Reconciliation::Underpaid { shortfall } => t_args_lang(
            "payment-underpaid",
            &[
                ("order", &short_id),
                ("shortfall", &ui_builder::format_amount(*shortfall)),
                ("currency", &order.pay_currency.to_uppercase()),
            ],
            lang,
        ),
        Reconciliation::Failed => t_args_lang("payment-failed", &[("order", &short_id)], lang),
        Reconciliation::Overpaid { .. } | Reconciliation::NoChange => return None,
    };
    Some(BotCommand::text(order.chat_id, text))
}
