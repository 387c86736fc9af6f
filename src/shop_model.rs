//! # Shop Data Model
//!
//! Rows owned by a shop bot: the catalog tree, carts and orders.
//!
//! ## Core Concepts
//!
//! - **Bot**: a registered Telegram bot token with the owner's payout wallet
//! - **Category**: a node of the catalog tree, optionally nested under a parent
//! - **Product**: something for sale, priced through one or more price tiers
//! - **PriceTier**: a named price variant of a product ("Standard", "500g", ...)
//! - **Cart**: the in-progress basket of one chat talking to one bot
//! - **Order**: a checked-out cart, snapshotted as a description and a total
//!
//! Money is a [`Decimal`] in the shop's base currency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order_lifecycle::{OrderStatus, PayoutStatus};

pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to my shop!";
pub const DEFAULT_UNIT: &str = "item";

/// A shop bot registered by an owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bot {
    pub id: Uuid,
    /// Telegram bot token, unique across the platform
    pub token: String,
    /// Wallet receiving payouts for this shop
    pub wallet: String,
    /// Text shown above the main menu
    pub welcome_message: String,
    /// Updates for inactive bots are ignored
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Bot {
    /// Token prefix safe to put in logs
    pub fn token_snippet(&self) -> String {
        token_snippet(&self.token)
    }
}

pub fn token_snippet(token: &str) -> String {
    token.chars().take(10).collect::<String>() + "..."
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub name: String,
    /// `None` for top-level categories
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Unit label shown next to prices ("item", "g", "pack")
    pub unit: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceTier {
    pub id: Uuid,
    pub product_id: Uuid,
    pub label: String,
    pub price: Decimal,
}

/// A product together with its price tiers, as listed at a catalog leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductWithTiers {
    pub product: Product,
    pub price_tiers: Vec<PriceTier>,
}

/// Identifies one shopper's basket: the (chat, bot) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartKey {
    pub chat_id: i64,
    pub bot_id: Uuid,
}

impl CartKey {
    pub fn new(chat_id: i64, bot_id: Uuid) -> Self {
        Self { chat_id, bot_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub chat_id: i64,
    pub bot_id: Uuid,
}

impl Cart {
    pub fn key(&self) -> CartKey {
        CartKey::new(self.chat_id, self.bot_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub price_tier_id: Uuid,
    /// Always at least 1
    pub quantity: i32,
}

/// A cart item joined with its product and tier, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_name: String,
    pub tier_label: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// "2x ProductA (Standard)"
    pub fn describe(&self) -> String {
        format!(
            "{}x {} ({})",
            self.quantity, self.product_name, self.tier_label
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub chat_id: i64,
    pub telegram_username: Option<String>,
    /// Buyer's Telegram language, used for notifications sent outside a chat turn
    pub language_code: Option<String>,
    /// Denormalised snapshot of the purchased lines
    pub description: String,
    pub price: Decimal,
    pub pay_currency: String,
    pub status: OrderStatus,
    pub payout_status: PayoutStatus,
    pub shipping_address: Option<String>,
    pub customer_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// First block of the id, enough for a buyer to quote
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

/// Buyer identity captured at checkout time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buyer {
    pub chat_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub bot_id: Uuid,
    pub chat_id: i64,
    pub telegram_username: Option<String>,
    pub language_code: Option<String>,
    pub description: String,
    pub price: Decimal,
    pub pay_currency: String,
}

/// Fields written together with a status transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderUpdate {
    pub shipping_address: Option<String>,
    pub customer_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewBot {
    pub token: String,
    pub wallet: String,
    pub welcome_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCategory {
    pub bot_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPriceTier {
    pub label: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub price_tiers: Vec<NewPriceTier>,
}
