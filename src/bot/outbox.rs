//! Outbound Telegram traffic.
//!
//! Handlers never call the Bot API themselves: they return [`BotCommand`]s
//! and an [`Outbox`] executes them for the bot that received the update.
//! Text is sent in HTML parse mode.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardMarkup, InputFile, MessageId, ParseMode};
use tracing::{debug, info, warn};

use crate::shop_model::token_snippet;

/// One Bot API call
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    SendText {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    SendPhoto {
        chat_id: i64,
        photo_url: String,
        caption: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    /// Replace the text of an earlier message, or send a new one if that fails
    EditText {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
}

impl BotCommand {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        BotCommand::SendText {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn text_with_keyboard(
        chat_id: i64,
        text: impl Into<String>,
        keyboard: InlineKeyboardMarkup,
    ) -> Self {
        BotCommand::SendText {
            chat_id,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Edit `message_id` when known, else send
    pub fn replace(
        chat_id: i64,
        message_id: Option<i32>,
        text: impl Into<String>,
        keyboard: InlineKeyboardMarkup,
    ) -> Self {
        match message_id {
            Some(message_id) => BotCommand::EditText {
                chat_id,
                message_id,
                text: text.into(),
                keyboard: Some(keyboard),
            },
            None => BotCommand::text_with_keyboard(chat_id, text, keyboard),
        }
    }

    pub fn answer(callback_id: impl Into<String>) -> Self {
        BotCommand::AnswerCallback {
            callback_id: callback_id.into(),
            text: None,
        }
    }

    pub fn answer_with_text(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        BotCommand::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
        }
    }

    pub fn keyboard(&self) -> Option<&InlineKeyboardMarkup> {
        match self {
            BotCommand::SendText { keyboard, .. }
            | BotCommand::SendPhoto { keyboard, .. }
            | BotCommand::EditText { keyboard, .. } => keyboard.as_ref(),
            BotCommand::AnswerCallback { .. } => None,
        }
    }

    /// Text carried by the command, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            BotCommand::SendText { text, .. } | BotCommand::EditText { text, .. } => Some(text),
            BotCommand::SendPhoto { caption, .. } => Some(caption),
            BotCommand::AnswerCallback { text, .. } => text.as_deref(),
        }
    }
}

#[async_trait]
pub trait Outbox: Send + Sync {
    /// Execute `commands` in order as `bot_token`. Failures are logged,
    /// never returned: delivery is best effort.
    async fn deliver(&self, bot_token: &str, commands: Vec<BotCommand>);

    /// Point the bot's webhook at `url`
    async fn register_webhook(&self, bot_token: &str, url: &str) -> Result<()>;
}

/// Executes commands against the Telegram Bot API
#[derive(Default)]
pub struct TelegramOutbox {
    bots: Mutex<HashMap<String, Bot>>,
}

impl TelegramOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn bot(&self, token: &str) -> Bot {
        let mut bots = self.bots.lock().unwrap_or_else(|p| p.into_inner());
        bots.entry(token.to_string())
            .or_insert_with(|| Bot::new(token))
            .clone()
    }

    async fn send_text(
        bot: &Bot,
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        match keyboard {
            Some(keyboard) => request.reply_markup(keyboard).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn execute(bot: &Bot, command: BotCommand) -> Result<()> {
        match command {
            BotCommand::SendText {
                chat_id,
                text,
                keyboard,
            } => Self::send_text(bot, chat_id, text, keyboard).await,
            BotCommand::SendPhoto {
                chat_id,
                photo_url,
                caption,
                keyboard,
            } => {
                let url = match reqwest::Url::parse(&photo_url) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(chat_id, error = %e, "Invalid product image URL, sending text");
                        return Self::send_text(bot, chat_id, caption, keyboard).await;
                    }
                };
                let request = bot
                    .send_photo(ChatId(chat_id), InputFile::url(url))
                    .caption(caption.clone())
                    .parse_mode(ParseMode::Html);
                let result = match keyboard.clone() {
                    Some(keyboard) => request.reply_markup(keyboard).await,
                    None => request.await,
                };
                if let Err(e) = result {
                    warn!(chat_id, error = %e, "Photo send failed, sending text");
                    return Self::send_text(bot, chat_id, caption, keyboard).await;
                }
                Ok(())
            }
            BotCommand::EditText {
                chat_id,
                message_id,
                text,
                keyboard,
            } => {
                let request = bot
                    .edit_message_text(ChatId(chat_id), MessageId(message_id), text.clone())
                    .parse_mode(ParseMode::Html);
                let result = match keyboard.clone() {
                    Some(keyboard) => request.reply_markup(keyboard).await,
                    None => request.await,
                };
                if let Err(e) = result {
                    debug!(chat_id, message_id, error = %e, "Edit failed, sending new message");
                    return Self::send_text(bot, chat_id, text, keyboard).await;
                }
                Ok(())
            }
            BotCommand::AnswerCallback { callback_id, text } => {
                let request = bot.answer_callback_query(CallbackQueryId(callback_id));
                match text {
                    Some(text) => request.text(text).await?,
                    None => request.await?,
                };
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn deliver(&self, bot_token: &str, commands: Vec<BotCommand>) {
        let bot = self.bot(bot_token);
        for command in commands {
            if let Err(e) = Self::execute(&bot, command).await {
                warn!(token = %token_snippet(bot_token), error = %e, "Failed to deliver bot command");
            }
        }
    }

    async fn register_webhook(&self, bot_token: &str, url: &str) -> Result<()> {
        let url = reqwest::Url::parse(url).context("Invalid webhook URL")?;
        self.bot(bot_token)
            .set_webhook(url)
            .await
            .context("Failed to set Telegram webhook")?;
        info!(token = %token_snippet(bot_token), "Telegram webhook registered");
        Ok(())
    }
}
