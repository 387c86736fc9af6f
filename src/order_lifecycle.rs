//! Order lifecycle state machine.
//!
//! ```text
//! awaiting_payment ──► awaiting_address ──► awaiting_note ──► paid
//!        │
//!        ├──► underpaid
//!        ├──► overpaid
//!        └──► failed
//! ```
//!
//! Every status change in the crate goes through [`OrderStatus::transition`]
//! so an out-of-order write is rejected instead of silently overwriting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ShopError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    AwaitingAddress,
    AwaitingNote,
    Paid,
    Underpaid,
    Overpaid,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::AwaitingPayment,
        OrderStatus::AwaitingAddress,
        OrderStatus::AwaitingNote,
        OrderStatus::Paid,
        OrderStatus::Underpaid,
        OrderStatus::Overpaid,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::AwaitingAddress => "awaiting_address",
            OrderStatus::AwaitingNote => "awaiting_note",
            OrderStatus::Paid => "paid",
            OrderStatus::Underpaid => "underpaid",
            OrderStatus::Overpaid => "overpaid",
            OrderStatus::Failed => "failed",
        }
    }

    /// Legal transitions table
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (AwaitingPayment, AwaitingAddress)
                | (AwaitingPayment, Underpaid)
                | (AwaitingPayment, Overpaid)
                | (AwaitingPayment, Failed)
                | (AwaitingAddress, AwaitingNote)
                | (AwaitingNote, Paid)
        )
    }

    /// Validate a transition, logging and rejecting illegal ones
    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, ShopError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            warn!(from = %self, to = %next, "Rejected illegal order transition");
            Err(ShopError::IllegalTransition { from: self, to: next })
        }
    }

    /// No further status change is possible
    pub fn is_terminal(&self) -> bool {
        OrderStatus::ALL.iter().all(|next| !self.can_transition_to(*next))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}

/// Owner payout state. `Pending` marks a claimed payout that is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Unpaid => "unpaid",
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PayoutStatus::Unpaid),
            "pending" => Ok(PayoutStatus::Pending),
            "paid" => Ok(PayoutStatus::Paid),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(format!("unknown payout status '{other}'")),
        }
    }
}
