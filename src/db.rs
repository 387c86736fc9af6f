//! PostgreSQL implementation of [`ShopStore`].
//!
//! Cascades are enforced by foreign keys. Cart adds are upserts on the
//! `(chat_id, bot_id)` and `(cart_id, price_tier_id)` unique keys so two
//! concurrent deliveries of the same callback cannot create duplicate rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::order_lifecycle::{OrderStatus, PayoutStatus};
use crate::shop_model::{
    Bot, Cart, CartItem, CartKey, CartLine, Category, NewBot, NewCategory, NewOrder,
    NewPriceTier, NewProduct, Order, OrderUpdate, PriceTier, Product, ProductWithTiers,
    DEFAULT_UNIT, DEFAULT_WELCOME_MESSAGE,
};
use crate::store::{ShopStore, StoreResult};

const BOT_COLUMNS: &str = "id, token, wallet, welcome_message, is_active, created_at";
const PRODUCT_COLUMNS: &str = "id, category_id, name, description, unit, image_url, video_url";
const ORDER_COLUMNS: &str = "id, bot_id, chat_id, telegram_username, language_code, description, \
     price, pay_currency, status, payout_status, shipping_address, customer_note, created_at";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bots (
            id UUID PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            wallet TEXT NOT NULL,
            welcome_message TEXT NOT NULL DEFAULT 'Welcome to my shop!',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bots table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY,
            bot_id UUID NOT NULL REFERENCES bots(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            parent_id UUID REFERENCES categories(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY,
            category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            unit TEXT NOT NULL DEFAULT 'item',
            image_url TEXT,
            video_url TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create products table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS price_tiers (
            id UUID PRIMARY KEY,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            price NUMERIC(20, 8) NOT NULL CHECK (price > 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create price_tiers table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS carts (
            id UUID PRIMARY KEY,
            chat_id BIGINT NOT NULL,
            bot_id UUID NOT NULL REFERENCES bots(id) ON DELETE CASCADE,
            CONSTRAINT carts_chat_bot_key UNIQUE (chat_id, bot_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create carts table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cart_items (
            id UUID PRIMARY KEY,
            cart_id UUID NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
            price_tier_id UUID NOT NULL REFERENCES price_tiers(id) ON DELETE CASCADE,
            quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
            CONSTRAINT cart_items_cart_tier_key UNIQUE (cart_id, price_tier_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create cart_items table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY,
            bot_id UUID NOT NULL REFERENCES bots(id) ON DELETE CASCADE,
            chat_id BIGINT NOT NULL,
            telegram_username TEXT,
            language_code TEXT,
            description TEXT NOT NULL,
            price NUMERIC(20, 8) NOT NULL,
            pay_currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'awaiting_payment',
            payout_status TEXT NOT NULL DEFAULT 'unpaid',
            shipping_address TEXT,
            customer_note TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create orders table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS orders_chat_status_idx
            ON orders (chat_id, bot_id, status, created_at DESC)",
    )
    .execute(pool)
    .await
    .context("Failed to create orders index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Map write failures on constraints to the store's own variants
fn map_write_error(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(what.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference(what.to_string());
        }
    }
    StoreError::Database(err)
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    bot_id: Uuid,
    chat_id: i64,
    telegram_username: Option<String>,
    language_code: Option<String>,
    description: String,
    price: Decimal,
    pay_currency: String,
    status: String,
    payout_status: String,
    shipping_address: Option<String>,
    customer_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            bot_id: row.bot_id,
            chat_id: row.chat_id,
            telegram_username: row.telegram_username,
            language_code: row.language_code,
            description: row.description,
            price: row.price,
            pay_currency: row.pay_currency,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            payout_status: row.payout_status.parse().map_err(StoreError::Corrupt)?,
            shipping_address: row.shipping_address,
            customer_note: row.customer_note,
            created_at: row.created_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn tiers_for_products(&self, product_ids: &[Uuid]) -> StoreResult<Vec<PriceTier>> {
        Ok(sqlx::query_as::<_, PriceTier>(
            "SELECT id, product_id, label, price FROM price_tiers
             WHERE product_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ShopStore for PgStore {
    async fn create_bot(&self, bot: NewBot) -> StoreResult<Bot> {
        debug!(token = %crate::shop_model::token_snippet(&bot.token), "Creating bot");
        sqlx::query_as::<_, Bot>(&format!(
            "INSERT INTO bots (id, token, wallet, welcome_message) VALUES ($1, $2, $3, $4)
             RETURNING {BOT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&bot.token)
        .bind(&bot.wallet)
        .bind(
            bot.welcome_message
                .as_deref()
                .unwrap_or(DEFAULT_WELCOME_MESSAGE),
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "bot token"))
    }

    async fn bot(&self, bot_id: Uuid) -> StoreResult<Option<Bot>> {
        Ok(
            sqlx::query_as::<_, Bot>(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = $1"))
                .bind(bot_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn bot_by_token(&self, token: &str) -> StoreResult<Option<Bot>> {
        Ok(
            sqlx::query_as::<_, Bot>(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE token = $1"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_welcome_message(&self, bot_id: Uuid, message: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE bots SET welcome_message = $2 WHERE id = $1")
            .bind(bot_id)
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_bot_active(&self, bot_id: Uuid, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE bots SET is_active = $2 WHERE id = $1")
            .bind(bot_id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bot(&self, bot_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM bots WHERE id = $1")
            .bind(bot_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, bot_id, name, parent_id) VALUES ($1, $2, $3, $4)
             RETURNING id, bot_id, name, parent_id",
        )
        .bind(Uuid::new_v4())
        .bind(category.bot_id)
        .bind(&category.name)
        .bind(category.parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "category parent or bot"))
    }

    async fn category(&self, category_id: Uuid) -> StoreResult<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, bot_id, name, parent_id FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn root_categories(&self, bot_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, bot_id, name, parent_id FROM categories
             WHERE bot_id = $1 AND parent_id IS NULL ORDER BY created_at, id",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn sub_categories(&self, category_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT id, bot_id, name, parent_id FROM categories
             WHERE parent_id = $1 ORDER BY created_at, id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_category(&self, category_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_product(&self, product: NewProduct) -> StoreResult<ProductWithTiers> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, category_id, name, description, unit, image_url, video_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit.as_deref().unwrap_or(DEFAULT_UNIT))
        .bind(&product.image_url)
        .bind(&product.video_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "product category"))?;

        let mut tiers = Vec::with_capacity(product.price_tiers.len());
        for tier in &product.price_tiers {
            let tier = sqlx::query_as::<_, PriceTier>(
                "INSERT INTO price_tiers (id, product_id, label, price) VALUES ($1, $2, $3, $4)
                 RETURNING id, product_id, label, price",
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(&tier.label)
            .bind(tier.price)
            .fetch_one(&mut *tx)
            .await?;
            tiers.push(tier);
        }

        tx.commit().await?;
        Ok(ProductWithTiers {
            product: row,
            price_tiers: tiers,
        })
    }

    async fn products_with_tiers(&self, category_id: Uuid) -> StoreResult<Vec<ProductWithTiers>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = $1 ORDER BY created_at, id"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let tiers = self.tiers_for_products(&ids).await?;

        Ok(products
            .into_iter()
            .map(|product| {
                let price_tiers = tiers
                    .iter()
                    .filter(|t| t.product_id == product.id)
                    .cloned()
                    .collect();
                ProductWithTiers {
                    product,
                    price_tiers,
                }
            })
            .collect())
    }

    async fn product_bot_id(&self, product_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT c.bot_id FROM products p JOIN categories c ON c.id = p.category_id
             WHERE p.id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_price_tier(&self, product_id: Uuid, tier: NewPriceTier) -> StoreResult<PriceTier> {
        sqlx::query_as::<_, PriceTier>(
            "INSERT INTO price_tiers (id, product_id, label, price) VALUES ($1, $2, $3, $4)
             RETURNING id, product_id, label, price",
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(&tier.label)
        .bind(tier.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "price tier product"))
    }

    async fn price_tier_bot_id(&self, tier_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT c.bot_id FROM price_tiers t
             JOIN products p ON p.id = t.product_id
             JOIN categories c ON c.id = p.category_id
             WHERE t.id = $1",
        )
        .bind(tier_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_price_tier(&self, tier_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM price_tiers WHERE id = $1")
            .bind(tier_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_cart_item(&self, key: CartKey, tier_id: Uuid) -> StoreResult<CartItem> {
        let mut tx = self.pool.begin().await?;

        let cart_id: Uuid = sqlx::query_scalar(
            "INSERT INTO carts (id, chat_id, bot_id) VALUES ($1, $2, $3)
             ON CONFLICT (chat_id, bot_id) DO UPDATE SET chat_id = EXCLUDED.chat_id
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(key.chat_id)
        .bind(key.bot_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "cart bot"))?;

        let item = sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (id, cart_id, price_tier_id, quantity) VALUES ($1, $2, $3, 1)
             ON CONFLICT (cart_id, price_tier_id)
             DO UPDATE SET quantity = cart_items.quantity + 1
             RETURNING id, cart_id, price_tier_id, quantity",
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(tier_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "cart item price tier"))?;

        tx.commit().await?;
        Ok(item)
    }

    async fn cart(&self, key: CartKey) -> StoreResult<Option<Cart>> {
        Ok(sqlx::query_as::<_, Cart>(
            "SELECT id, chat_id, bot_id FROM carts WHERE chat_id = $1 AND bot_id = $2",
        )
        .bind(key.chat_id)
        .bind(key.bot_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn cart_by_id(&self, cart_id: Uuid) -> StoreResult<Option<Cart>> {
        Ok(
            sqlx::query_as::<_, Cart>("SELECT id, chat_id, bot_id FROM carts WHERE id = $1")
                .bind(cart_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            "SELECT ci.id AS item_id, p.name AS product_name, t.label AS tier_label,
                    t.price AS unit_price, ci.quantity
             FROM cart_items ci
             JOIN price_tiers t ON t.id = ci.price_tier_id
             JOIN products p ON p.id = t.product_id
             WHERE ci.cart_id = $1
             ORDER BY ci.created_at, ci.id",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn consume_cart_lines(&self, cart_id: Uuid, lines: &[CartLine]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;
        for line in lines {
            let deleted = sqlx::query(
                "DELETE FROM cart_items WHERE id = $1 AND cart_id = $2 AND quantity <= $3",
            )
            .bind(line.item_id)
            .bind(cart_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if deleted.rows_affected() > 0 {
                touched += 1;
                continue;
            }
            let updated = sqlx::query(
                "UPDATE cart_items SET quantity = quantity - $3 WHERE id = $1 AND cart_id = $2",
            )
            .bind(line.item_id)
            .bind(cart_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            touched += updated.rows_affected();
        }
        tx.commit().await?;
        Ok(touched)
    }

    async fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, bot_id, chat_id, telegram_username, language_code,
                                 description, price, pay_currency)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(order.bot_id)
        .bind(order.chat_id)
        .bind(&order.telegram_username)
        .bind(&order.language_code)
        .bind(&order.description)
        .bind(order.price)
        .bind(&order.pay_currency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "order bot"))?;
        row.try_into()
    }

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        update: OrderUpdate,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = $3,
                 shipping_address = COALESCE($4, shipping_address),
                 customer_note = COALESCE($5, customer_note)
             WHERE id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(update.shipping_address)
        .bind(update.customer_note)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn latest_order_in_status(
        &self,
        key: CartKey,
        status: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE chat_id = $1 AND bot_id = $2 AND status = $3
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(key.chat_id)
        .bind(key.bot_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn orders_for_chat(&self, key: CartKey, limit: i64) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE chat_id = $1 AND bot_id = $2
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(key.chat_id)
        .bind(key.bot_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_orders(rows)
    }

    async fn orders_for_bot(&self, bot_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE bot_id = $1 ORDER BY created_at DESC"
        ))
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        into_orders(rows)
    }

    async fn transition_payout(
        &self,
        order_id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payout_status = $3 WHERE id = $1 AND payout_status = $2",
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
