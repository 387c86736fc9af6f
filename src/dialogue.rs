//! Post-payment collection dialogue: shipping address, then a note.
//!
//! There is no session state. The step is derived from the chat's most
//! recent order in `awaiting_address` (checked first) or `awaiting_note`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::ShopError;
use crate::order_lifecycle::OrderStatus;
use crate::shop_model::{CartKey, Order, OrderUpdate};
use crate::store::ShopStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStep {
    Address,
    Note,
}

impl CollectionStep {
    /// Steps in matching priority
    pub const ORDER: [CollectionStep; 2] = [CollectionStep::Address, CollectionStep::Note];

    pub fn waiting_status(self) -> OrderStatus {
        match self {
            CollectionStep::Address => OrderStatus::AwaitingAddress,
            CollectionStep::Note => OrderStatus::AwaitingNote,
        }
    }

    pub fn next_status(self) -> OrderStatus {
        match self {
            CollectionStep::Address => OrderStatus::AwaitingNote,
            CollectionStep::Note => OrderStatus::Paid,
        }
    }

    fn update(self, text: &str) -> OrderUpdate {
        match self {
            CollectionStep::Address => OrderUpdate {
                shipping_address: Some(text.to_string()),
                ..OrderUpdate::default()
            },
            CollectionStep::Note => OrderUpdate {
                customer_note: Some(text.to_string()),
                ..OrderUpdate::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    /// Nothing is waiting for input from this chat
    NoPendingOrder,
    AddressSaved(Order),
    /// The order is now `paid`
    NoteSaved(Order),
}

#[derive(Clone)]
pub struct PostPaymentCollection {
    store: Arc<dyn ShopStore>,
}

impl PostPaymentCollection {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// The step this chat is at, with the order it applies to
    pub async fn pending_step(
        &self,
        key: CartKey,
    ) -> Result<Option<(CollectionStep, Order)>, ShopError> {
        for step in CollectionStep::ORDER {
            if let Some(order) = self
                .store
                .latest_order_in_status(key, step.waiting_status())
                .await?
            {
                return Ok(Some((step, order)));
            }
        }
        Ok(None)
    }

    /// Store `text` verbatim into the pending order and advance it
    pub async fn accept_text(
        &self,
        key: CartKey,
        text: &str,
    ) -> Result<CollectionOutcome, ShopError> {
        let Some((step, order)) = self.pending_step(key).await? else {
            return Ok(CollectionOutcome::NoPendingOrder);
        };

        let next = order.status.transition(step.next_status())?;
        let applied = self
            .store
            .transition_order(order.id, order.status, next, step.update(text))
            .await?;
        if !applied {
            warn!(order_id = %order.id, step = ?step, "Order moved while collecting input");
            return Err(ShopError::Conflict(format!(
                "order {} is no longer {}",
                order.id, order.status
            )));
        }

        let updated = self
            .store
            .order(order.id)
            .await?
            .ok_or_else(|| ShopError::not_found("order", order.id))?;
        info!(order_id = %updated.id, status = %updated.status, "Collected post-payment input");

        Ok(match step {
            CollectionStep::Address => CollectionOutcome::AddressSaved(updated),
            CollectionStep::Note => CollectionOutcome::NoteSaved(updated),
        })
    }
}
