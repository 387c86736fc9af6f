//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `callback_data`: Typed inline button payloads
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `message_handler`: Handles incoming text messages
//! - `dialogue_manager`: Post-payment address and note collection replies
//! - `ui_builder`: Creates keyboards and formats messages
//! - `outbox`: Outbound commands and their Telegram executor
//!
//! Handlers only read and write the store; everything sent back to Telegram
//! is returned as a list of [`BotCommand`]s.

pub mod callback_data;
pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod outbox;
pub mod ui_builder;

use std::sync::Arc;

use teloxide::types::{Update, UpdateKind, User};
use tracing::{debug, error, warn};

use crate::cart::CartService;
use crate::catalog::CatalogReader;
use crate::checkout::CheckoutOrchestrator;
use crate::dialogue::PostPaymentCollection;
use crate::errors::{ProviderError, ShopError};
use crate::localization::t_lang;
use crate::payout::PayoutService;
use crate::shop_model::{Bot as ShopBot, Buyer, CartKey};
use crate::store::ShopStore;

pub use callback_data::CallbackAction;
pub use outbox::{BotCommand, Outbox, TelegramOutbox};

/// Number of orders listed in the buyer's history
pub const ORDER_HISTORY_LIMIT: i64 = 10;

/// The parts of a Telegram update the shop reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum InboundUpdate {
    Callback {
        callback_id: String,
        chat_id: i64,
        /// Message carrying the pressed keyboard, when still accessible
        message_id: Option<i32>,
        buyer: Buyer,
        data: String,
    },
    Text {
        chat_id: i64,
        buyer: Buyer,
        text: String,
    },
    Ignored,
}

fn buyer(chat_id: i64, user: Option<&User>) -> Buyer {
    Buyer {
        chat_id,
        username: user.and_then(|u| u.username.clone()),
        language_code: user.and_then(|u| u.language_code.clone()),
    }
}

impl InboundUpdate {
    pub fn from_update(update: &Update) -> Self {
        match &update.kind {
            UpdateKind::Message(msg) => match msg.text() {
                Some(text) => {
                    let chat_id = msg.chat.id.0;
                    InboundUpdate::Text {
                        chat_id,
                        buyer: buyer(chat_id, msg.from.as_ref()),
                        text: text.to_string(),
                    }
                }
                None => InboundUpdate::Ignored,
            },
            UpdateKind::CallbackQuery(q) => {
                let (chat_id, message_id) = match &q.message {
                    Some(message) => (message.chat().id.0, Some(message.id().0)),
                    None => (q.from.id.0 as i64, None),
                };
                InboundUpdate::Callback {
                    callback_id: q.id.0.clone(),
                    chat_id,
                    message_id,
                    buyer: buyer(chat_id, Some(&q.from)),
                    data: q.data.clone().unwrap_or_default(),
                }
            }
            _ => InboundUpdate::Ignored,
        }
    }
}

/// Per-update context handed to the handlers
#[derive(Debug, Clone)]
pub struct Turn<'a> {
    pub bot: &'a ShopBot,
    pub chat_id: i64,
    pub message_id: Option<i32>,
    pub buyer: &'a Buyer,
}

impl Turn<'_> {
    pub fn key(&self) -> CartKey {
        CartKey::new(self.chat_id, self.bot.id)
    }

    pub fn lang(&self) -> Option<&str> {
        self.buyer.language_code.as_deref()
    }
}

/// Routes inbound updates to the shop services
pub struct ConversationDispatcher {
    pub(crate) store: Arc<dyn ShopStore>,
    pub(crate) catalog: CatalogReader,
    pub(crate) cart: CartService,
    pub(crate) checkout: Arc<CheckoutOrchestrator>,
    pub(crate) collection: PostPaymentCollection,
    pub(crate) payout: Arc<PayoutService>,
}

impl ConversationDispatcher {
    pub fn new(
        store: Arc<dyn ShopStore>,
        checkout: Arc<CheckoutOrchestrator>,
        payout: Arc<PayoutService>,
    ) -> Self {
        Self {
            catalog: CatalogReader::new(store.clone()),
            cart: CartService::new(store.clone()),
            collection: PostPaymentCollection::new(store.clone()),
            store,
            checkout,
            payout,
        }
    }

    pub fn price_currency(&self) -> &str {
        self.checkout.price_currency()
    }

    /// Commands answering `update` for `bot`. Never fails: errors become
    /// messages to the buyer.
    pub async fn dispatch(&self, bot: &ShopBot, update: InboundUpdate) -> Vec<BotCommand> {
        if !bot.is_active {
            debug!(bot_id = %bot.id, "Ignoring update for inactive bot");
            return Vec::new();
        }

        match update {
            InboundUpdate::Callback {
                callback_id,
                chat_id,
                message_id,
                buyer,
                data,
            } => {
                let turn = Turn {
                    bot,
                    chat_id,
                    message_id,
                    buyer: &buyer,
                };
                let action = match data.parse::<CallbackAction>() {
                    Ok(action) => action,
                    Err(e) => {
                        warn!(chat_id, error = %e, "Unknown callback payload");
                        return vec![BotCommand::answer_with_text(
                            callback_id,
                            t_lang("error-unknown-action", turn.lang()),
                        )];
                    }
                };
                debug!(chat_id, action = %action, "Callback action");
                match callback_handler::handle_action(self, &turn, &callback_id, action).await {
                    Ok(commands) => commands,
                    Err(e) => {
                        vec![BotCommand::answer_with_text(
                            callback_id,
                            error_text(&e, turn.lang()),
                        )]
                    }
                }
            }
            InboundUpdate::Text {
                chat_id,
                buyer,
                text,
            } => {
                let turn = Turn {
                    bot,
                    chat_id,
                    message_id: None,
                    buyer: &buyer,
                };
                match message_handler::handle_text(self, &turn, &text).await {
                    Ok(commands) => commands,
                    Err(e) => vec![BotCommand::text(chat_id, error_text(&e, turn.lang()))],
                }
            }
            InboundUpdate::Ignored => Vec::new(),
        }
    }
}

/// Buyer-facing text for a failed action
pub fn error_text(err: &ShopError, language_code: Option<&str>) -> String {
    match err {
        ShopError::NotFound { .. } => t_lang("error-not-found", language_code),
        ShopError::EmptyCart(_) => t_lang("cart-empty", language_code),
        ShopError::Provider(ProviderError::NotConfigured | ProviderError::CircuitOpen) => {
            t_lang("error-payments-unavailable", language_code)
        }
        ShopError::Provider(_) => t_lang("payment-create-failed", language_code),
        other => {
            error!(error = %other, "Bot action failed");
            t_lang("error-generic", language_code)
        }
    }
}
