//! Message Handler module for processing incoming Telegram messages

use tracing::debug;

use crate::errors::ShopError;

use super::callback_handler::main_menu;
use super::dialogue_manager::handle_collection_input;
use super::outbox::BotCommand;
use super::{ConversationDispatcher, Turn};

/// Free text goes to a pending address/note prompt first; anything else,
/// and every `/command`, shows the main menu.
pub async fn handle_text(
    shop: &ConversationDispatcher,
    turn: &Turn<'_>,
    text: &str,
) -> Result<Vec<BotCommand>, ShopError> {
    if text.starts_with('/') {
        debug!(chat_id = turn.chat_id, command = %text, "Bot command, showing main menu");
        return Ok(vec![main_menu(turn)]);
    }

    if let Some(commands) = handle_collection_input(shop, turn, text).await? {
        return Ok(commands);
    }

    debug!(chat_id = turn.chat_id, "No pending order, showing main menu");
    Ok(vec![main_menu(turn)])
}
