//! # Shop Administration Module
//!
//! Operator-side operations behind the management API: registering bots and
//! editing their catalog. Input is validated here before it reaches the store,
//! including rules the store does not enforce on its own (a category's parent
//! must belong to the same bot, a product needs at least one positive price).

use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{ShopError, StoreError};
use crate::shop_model::{
    Bot, Category, NewBot, NewCategory, NewPriceTier, NewProduct, Order, PriceTier,
    ProductWithTiers,
};
use crate::store::ShopStore;

/// Telegram bot token: numeric bot id, colon, secret
pub const BOT_TOKEN_PATTERN: &str = r"^\d+:[A-Za-z0-9_-]{30,}$";

static BOT_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(BOT_TOKEN_PATTERN).expect("Bot token pattern should be valid")
});

pub fn is_valid_bot_token(token: &str) -> bool {
    BOT_TOKEN_REGEX.is_match(token)
}

/// Store failures as seen by an operator
fn admin_error(err: StoreError) -> ShopError {
    match err {
        StoreError::Duplicate(what) => ShopError::Conflict(what),
        StoreError::MissingReference(what) => ShopError::NotFound {
            entity: "reference",
            id: what,
        },
        other => ShopError::Store(other),
    }
}

fn required(field: &str, value: &str) -> Result<String, ShopError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ShopError::Validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_tier(tier: NewPriceTier) -> Result<NewPriceTier, ShopError> {
    let label = required("price tier label", &tier.label)?;
    if tier.price <= Decimal::ZERO {
        return Err(ShopError::Validation(format!(
            "price of tier '{label}' must be greater than zero"
        )));
    }
    Ok(NewPriceTier {
        label,
        price: tier.price,
    })
}

pub struct ShopAdmin {
    store: Arc<dyn ShopStore>,
}

impl ShopAdmin {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// Register a new shop bot. Duplicate tokens are a conflict.
    pub async fn register_bot(&self, new_bot: NewBot) -> Result<Bot, ShopError> {
        let token = new_bot.token.trim().to_string();
        if !is_valid_bot_token(&token) {
            return Err(ShopError::Validation("invalid bot token format".to_string()));
        }
        let wallet = required("wallet address", &new_bot.wallet)?;

        let bot = self
            .store
            .create_bot(NewBot {
                token,
                wallet,
                welcome_message: optional(new_bot.welcome_message),
            })
            .await
            .map_err(admin_error)?;

        info!(bot_id = %bot.id, token = %bot.token_snippet(), "Registered shop bot");
        Ok(bot)
    }

    pub async fn bot(&self, bot_id: Uuid) -> Result<Bot, ShopError> {
        self.store
            .bot(bot_id)
            .await?
            .ok_or_else(|| ShopError::not_found("bot", bot_id))
    }

    pub async fn delete_bot(&self, bot_id: Uuid) -> Result<(), ShopError> {
        if !self.store.delete_bot(bot_id).await? {
            return Err(ShopError::not_found("bot", bot_id));
        }
        info!(bot_id = %bot_id, "Deleted shop bot");
        Ok(())
    }

    pub async fn set_welcome_message(&self, bot_id: Uuid, message: &str) -> Result<Bot, ShopError> {
        let message = required("welcome message", message)?;
        if !self.store.update_welcome_message(bot_id, &message).await? {
            return Err(ShopError::not_found("bot", bot_id));
        }
        self.bot(bot_id).await
    }

    pub async fn set_active(&self, bot_id: Uuid, active: bool) -> Result<Bot, ShopError> {
        if !self.store.set_bot_active(bot_id, active).await? {
            return Err(ShopError::not_found("bot", bot_id));
        }
        info!(bot_id = %bot_id, active, "Changed bot activity");
        self.bot(bot_id).await
    }

    /// Create a category; a parent, when given, must belong to the same bot
    pub async fn create_category(
        &self,
        bot_id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Category, ShopError> {
        let name = required("category name", name)?;
        self.bot(bot_id).await?;

        if let Some(parent_id) = parent_id {
            match self.store.category(parent_id).await? {
                Some(parent) if parent.bot_id == bot_id => {}
                Some(_) => {
                    warn!(bot_id = %bot_id, parent_id = %parent_id, "Parent category belongs to another bot");
                    return Err(ShopError::Validation(
                        "parent category belongs to another bot".to_string(),
                    ));
                }
                None => return Err(ShopError::not_found("category", parent_id)),
            }
        }

        self.store
            .create_category(NewCategory {
                bot_id,
                name,
                parent_id,
            })
            .await
            .map_err(admin_error)
    }

    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ShopError> {
        if !self.store.delete_category(category_id).await? {
            return Err(ShopError::not_found("category", category_id));
        }
        Ok(())
    }

    /// Create a product with at least one positively priced tier
    pub async fn create_product(
        &self,
        bot_id: Uuid,
        product: NewProduct,
    ) -> Result<ProductWithTiers, ShopError> {
        let name = required("product name", &product.name)?;
        if product.price_tiers.is_empty() {
            return Err(ShopError::Validation(
                "a product needs at least one price tier".to_string(),
            ));
        }
        let price_tiers = product
            .price_tiers
            .into_iter()
            .map(validate_tier)
            .collect::<Result<Vec<_>, _>>()?;

        match self.store.category(product.category_id).await? {
            Some(category) if category.bot_id == bot_id => {}
            _ => return Err(ShopError::not_found("category", product.category_id)),
        }

        let created = self
            .store
            .create_product(NewProduct {
                category_id: product.category_id,
                name,
                description: optional(product.description),
                unit: optional(product.unit),
                image_url: optional(product.image_url),
                video_url: optional(product.video_url),
                price_tiers,
            })
            .await
            .map_err(admin_error)?;

        info!(
            bot_id = %bot_id,
            product_id = %created.product.id,
            tiers = created.price_tiers.len(),
            "Created product"
        );
        Ok(created)
    }

    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ShopError> {
        if !self.store.delete_product(product_id).await? {
            return Err(ShopError::not_found("product", product_id));
        }
        Ok(())
    }

    pub async fn add_price_tier(
        &self,
        product_id: Uuid,
        tier: NewPriceTier,
    ) -> Result<PriceTier, ShopError> {
        let tier = validate_tier(tier)?;
        if self.store.product_bot_id(product_id).await?.is_none() {
            return Err(ShopError::not_found("product", product_id));
        }
        self.store
            .add_price_tier(product_id, tier)
            .await
            .map_err(admin_error)
    }

    /// Items referencing the tier leave every cart with it
    pub async fn delete_price_tier(&self, tier_id: Uuid) -> Result<(), ShopError> {
        if !self.store.delete_price_tier(tier_id).await? {
            return Err(ShopError::not_found("price tier", tier_id));
        }
        Ok(())
    }

    pub async fn orders(&self, bot_id: Uuid) -> Result<Vec<Order>, ShopError> {
        self.bot(bot_id).await?;
        Ok(self.store.orders_for_bot(bot_id).await?)
    }
}
