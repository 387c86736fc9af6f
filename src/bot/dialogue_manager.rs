//! Dialogue Manager module: replies for the post-payment collection steps

use tracing::{error, info};

use crate::dialogue::CollectionOutcome;
use crate::errors::ShopError;
use crate::localization::{t_args_lang, t_lang};
use crate::payout::PayoutOutcome;

use super::outbox::BotCommand;
use super::ui_builder::main_menu_keyboard;
use super::{ConversationDispatcher, Turn};

/// Try `text` as the answer to a pending address or note prompt.
/// `None` when the chat has nothing pending.
pub async fn handle_collection_input(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    text: &str,
) -> Result<Option<Vec<BotCommand>>, ShopError> {
    let lang = turn.lang();
    match shop.collection.accept_text(turn.key(), text).await? {
        CollectionOutcome::NoPendingOrder => Ok(None),
        CollectionOutcome::AddressSaved(order) => {
            let reply = format!(
                "{}\n\n{}",
                t_args_lang("address-saved", &[("order", &order.short_id())], lang),
                t_lang("ask-note", lang)
            );
            Ok(Some(vec![BotCommand::text(turn.chat_id, reply)]))
        }
        CollectionOutcome::NoteSaved(order) => {
            let reply = BotCommand::text_with_keyboard(
                turn.chat_id,
                t_args_lang("order-complete", &[("order", &order.short_id())], lang),
                main_menu_keyboard(lang),
            );

            match shop.payout.settle(order.id).await {
                Ok(PayoutOutcome::Paid { amount }) => {
                    info!(order_id = %order.id, amount = %amount, "Owner paid out");
                }
                Ok(outcome) => info!(order_id = %order.id, outcome = ?outcome, "Payout not sent"),
                Err(e) => error!(order_id = %order.id, error = %e, "Payout settlement failed"),
            }

            Ok(Some(vec![reply]))
        }
    }
}
