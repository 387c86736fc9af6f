//! In-process [`ShopStore`] guarded by a single mutex.
//!
//! Every operation takes the lock once, which makes each one atomic the same
//! way a transaction does in [`crate::db::PgStore`]. Used by the test-suite
//! and for running the bot without a database.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ShopStore, StoreResult};
use crate::errors::StoreError;
use crate::order_lifecycle::{OrderStatus, PayoutStatus};
use crate::shop_model::{
    Bot, Cart, CartItem, CartKey, CartLine, Category, NewBot, NewCategory, NewOrder,
    NewPriceTier, NewProduct, Order, OrderUpdate, PriceTier, Product, ProductWithTiers,
    DEFAULT_UNIT, DEFAULT_WELCOME_MESSAGE,
};

#[derive(Debug, Default)]
struct Tables {
    bots: Vec<Bot>,
    categories: Vec<Category>,
    products: Vec<Product>,
    price_tiers: Vec<PriceTier>,
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
}

impl Tables {
    /// The category and all of its descendants
    fn category_subtree(&self, root: Uuid) -> HashSet<Uuid> {
        let mut subtree = HashSet::from([root]);
        loop {
            let before = subtree.len();
            for category in &self.categories {
                if let Some(parent) = category.parent_id {
                    if subtree.contains(&parent) {
                        subtree.insert(category.id);
                    }
                }
            }
            if subtree.len() == before {
                return subtree;
            }
        }
    }

    fn remove_categories(&mut self, ids: &HashSet<Uuid>) {
        let product_ids: HashSet<Uuid> = self
            .products
            .iter()
            .filter(|p| ids.contains(&p.category_id))
            .map(|p| p.id)
            .collect();
        self.remove_products(&product_ids);
        self.categories.retain(|c| !ids.contains(&c.id));
    }

    fn remove_products(&mut self, ids: &HashSet<Uuid>) {
        let tier_ids: HashSet<Uuid> = self
            .price_tiers
            .iter()
            .filter(|t| ids.contains(&t.product_id))
            .map(|t| t.id)
            .collect();
        self.remove_tiers(&tier_ids);
        self.products.retain(|p| !ids.contains(&p.id));
    }

    fn remove_tiers(&mut self, ids: &HashSet<Uuid>) {
        self.cart_items.retain(|i| !ids.contains(&i.price_tier_id));
        self.price_tiers.retain(|t| !ids.contains(&t.id));
    }

    fn tier_bot_id(&self, tier_id: Uuid) -> Option<Uuid> {
        let tier = self.price_tiers.iter().find(|t| t.id == tier_id)?;
        self.product_bot_id(tier.product_id)
    }

    fn product_bot_id(&self, product_id: Uuid) -> Option<Uuid> {
        let product = self.products.iter().find(|p| p.id == product_id)?;
        self.categories
            .iter()
            .find(|c| c.id == product.category_id)
            .map(|c| c.bot_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of carts, including empty ones
    pub fn cart_count(&self) -> usize {
        self.lock().carts.len()
    }

    /// Number of cart item rows across all carts
    pub fn cart_item_count(&self) -> usize {
        self.lock().cart_items.len()
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn create_bot(&self, bot: NewBot) -> StoreResult<Bot> {
        let mut tables = self.lock();
        if tables.bots.iter().any(|b| b.token == bot.token) {
            return Err(StoreError::Duplicate("bot token".to_string()));
        }
        let row = Bot {
            id: Uuid::new_v4(),
            token: bot.token,
            wallet: bot.wallet,
            welcome_message: bot
                .welcome_message
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
            is_active: true,
            created_at: Utc::now(),
        };
        tables.bots.push(row.clone());
        Ok(row)
    }

    async fn bot(&self, bot_id: Uuid) -> StoreResult<Option<Bot>> {
        Ok(self.lock().bots.iter().find(|b| b.id == bot_id).cloned())
    }

    async fn bot_by_token(&self, token: &str) -> StoreResult<Option<Bot>> {
        Ok(self.lock().bots.iter().find(|b| b.token == token).cloned())
    }

    async fn update_welcome_message(&self, bot_id: Uuid, message: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.bots.iter_mut().find(|b| b.id == bot_id) {
            Some(bot) => {
                bot.welcome_message = message.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_bot_active(&self, bot_id: Uuid, active: bool) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.bots.iter_mut().find(|b| b.id == bot_id) {
            Some(bot) => {
                bot.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_bot(&self, bot_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        if !tables.bots.iter().any(|b| b.id == bot_id) {
            return Ok(false);
        }
        let categories: HashSet<Uuid> = tables
            .categories
            .iter()
            .filter(|c| c.bot_id == bot_id)
            .map(|c| c.id)
            .collect();
        tables.remove_categories(&categories);
        let carts: HashSet<Uuid> = tables
            .carts
            .iter()
            .filter(|c| c.bot_id == bot_id)
            .map(|c| c.id)
            .collect();
        tables.cart_items.retain(|i| !carts.contains(&i.cart_id));
        tables.carts.retain(|c| c.bot_id != bot_id);
        tables.orders.retain(|o| o.bot_id != bot_id);
        tables.bots.retain(|b| b.id != bot_id);
        Ok(true)
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut tables = self.lock();
        if !tables.bots.iter().any(|b| b.id == category.bot_id) {
            return Err(StoreError::MissingReference(format!("bot {}", category.bot_id)));
        }
        if let Some(parent) = category.parent_id {
            if !tables.categories.iter().any(|c| c.id == parent) {
                return Err(StoreError::MissingReference(format!("category {parent}")));
            }
        }
        let row = Category {
            id: Uuid::new_v4(),
            bot_id: category.bot_id,
            name: category.name,
            parent_id: category.parent_id,
        };
        tables.categories.push(row.clone());
        Ok(row)
    }

    async fn category(&self, category_id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self
            .lock()
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .cloned())
    }

    async fn root_categories(&self, bot_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(self
            .lock()
            .categories
            .iter()
            .filter(|c| c.bot_id == bot_id && c.parent_id.is_none())
            .cloned()
            .collect())
    }

    async fn sub_categories(&self, category_id: Uuid) -> StoreResult<Vec<Category>> {
        Ok(self
            .lock()
            .categories
            .iter()
            .filter(|c| c.parent_id == Some(category_id))
            .cloned()
            .collect())
    }

    async fn delete_category(&self, category_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        if !tables.categories.iter().any(|c| c.id == category_id) {
            return Ok(false);
        }
        let subtree = tables.category_subtree(category_id);
        tables.remove_categories(&subtree);
        Ok(true)
    }

    async fn create_product(&self, product: NewProduct) -> StoreResult<ProductWithTiers> {
        let mut tables = self.lock();
        if !tables.categories.iter().any(|c| c.id == product.category_id) {
            return Err(StoreError::MissingReference(format!(
                "category {}",
                product.category_id
            )));
        }
        let row = Product {
            id: Uuid::new_v4(),
            category_id: product.category_id,
            name: product.name,
            description: product.description,
            unit: product.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            image_url: product.image_url,
            video_url: product.video_url,
        };
        let tiers: Vec<PriceTier> = product
            .price_tiers
            .into_iter()
            .map(|tier| PriceTier {
                id: Uuid::new_v4(),
                product_id: row.id,
                label: tier.label,
                price: tier.price,
            })
            .collect();
        tables.products.push(row.clone());
        tables.price_tiers.extend(tiers.iter().cloned());
        Ok(ProductWithTiers {
            product: row,
            price_tiers: tiers,
        })
    }

    async fn products_with_tiers(&self, category_id: Uuid) -> StoreResult<Vec<ProductWithTiers>> {
        let tables = self.lock();
        Ok(tables
            .products
            .iter()
            .filter(|p| p.category_id == category_id)
            .map(|p| ProductWithTiers {
                product: p.clone(),
                price_tiers: tables
                    .price_tiers
                    .iter()
                    .filter(|t| t.product_id == p.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn product_bot_id(&self, product_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.lock().product_bot_id(product_id))
    }

    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Ok(false);
        }
        tables.remove_products(&HashSet::from([product_id]));
        Ok(true)
    }

    async fn add_price_tier(&self, product_id: Uuid, tier: NewPriceTier) -> StoreResult<PriceTier> {
        let mut tables = self.lock();
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Err(StoreError::MissingReference(format!("product {product_id}")));
        }
        let row = PriceTier {
            id: Uuid::new_v4(),
            product_id,
            label: tier.label,
            price: tier.price,
        };
        tables.price_tiers.push(row.clone());
        Ok(row)
    }

    async fn price_tier_bot_id(&self, tier_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.lock().tier_bot_id(tier_id))
    }

    async fn delete_price_tier(&self, tier_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        if !tables.price_tiers.iter().any(|t| t.id == tier_id) {
            return Ok(false);
        }
        tables.remove_tiers(&HashSet::from([tier_id]));
        Ok(true)
    }

    async fn add_cart_item(&self, key: CartKey, tier_id: Uuid) -> StoreResult<CartItem> {
        let mut tables = self.lock();
        if !tables.price_tiers.iter().any(|t| t.id == tier_id) {
            return Err(StoreError::MissingReference(format!("price tier {tier_id}")));
        }
        let cart_id = match tables
            .carts
            .iter()
            .find(|c| c.chat_id == key.chat_id && c.bot_id == key.bot_id)
        {
            Some(cart) => cart.id,
            None => {
                let cart = Cart {
                    id: Uuid::new_v4(),
                    chat_id: key.chat_id,
                    bot_id: key.bot_id,
                };
                let id = cart.id;
                tables.carts.push(cart);
                id
            }
        };
        if let Some(item) = tables
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.price_tier_id == tier_id)
        {
            item.quantity += 1;
            return Ok(item.clone());
        }
        let item = CartItem {
            id: Uuid::new_v4(),
            cart_id,
            price_tier_id: tier_id,
            quantity: 1,
        };
        tables.cart_items.push(item.clone());
        Ok(item)
    }

    async fn cart(&self, key: CartKey) -> StoreResult<Option<Cart>> {
        Ok(self
            .lock()
            .carts
            .iter()
            .find(|c| c.chat_id == key.chat_id && c.bot_id == key.bot_id)
            .cloned())
    }

    async fn cart_by_id(&self, cart_id: Uuid) -> StoreResult<Option<Cart>> {
        Ok(self.lock().carts.iter().find(|c| c.id == cart_id).cloned())
    }

    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let tables = self.lock();
        let mut lines = Vec::new();
        for item in tables.cart_items.iter().filter(|i| i.cart_id == cart_id) {
            let tier = tables
                .price_tiers
                .iter()
                .find(|t| t.id == item.price_tier_id)
                .ok_or_else(|| StoreError::Corrupt(format!("cart item {} without tier", item.id)))?;
            let product = tables
                .products
                .iter()
                .find(|p| p.id == tier.product_id)
                .ok_or_else(|| StoreError::Corrupt(format!("price tier {} without product", tier.id)))?;
            lines.push(CartLine {
                item_id: item.id,
                product_name: product.name.clone(),
                tier_label: tier.label.clone(),
                unit_price: tier.price,
                quantity: item.quantity,
            });
        }
        Ok(lines)
    }

    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|i| !(i.id == item_id && i.cart_id == cart_id));
        Ok(tables.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.lock();
        let before = tables.cart_items.len();
        tables.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn consume_cart_lines(&self, cart_id: Uuid, lines: &[CartLine]) -> StoreResult<u64> {
        let mut tables = self.lock();
        let mut touched = 0;
        for line in lines {
            if let Some(item) = tables
                .cart_items
                .iter_mut()
                .find(|i| i.id == line.item_id && i.cart_id == cart_id)
            {
                item.quantity -= line.quantity;
                touched += 1;
            }
        }
        tables.cart_items.retain(|i| i.quantity > 0);
        Ok(touched)
    }

    async fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        let mut tables = self.lock();
        if !tables.bots.iter().any(|b| b.id == order.bot_id) {
            return Err(StoreError::MissingReference(format!("bot {}", order.bot_id)));
        }
        let row = Order {
            id: Uuid::new_v4(),
            bot_id: order.bot_id,
            chat_id: order.chat_id,
            telegram_username: order.telegram_username,
            language_code: order.language_code,
            description: order.description,
            price: order.price,
            pay_currency: order.pay_currency,
            status: OrderStatus::AwaitingPayment,
            payout_status: PayoutStatus::Unpaid,
            shipping_address: None,
            customer_note: None,
            created_at: Utc::now(),
        };
        tables.orders.push(row.clone());
        Ok(row)
    }

    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.lock().orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        update: OrderUpdate,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status == from)
        else {
            return Ok(false);
        };
        order.status = to;
        if update.shipping_address.is_some() {
            order.shipping_address = update.shipping_address;
        }
        if update.customer_note.is_some() {
            order.customer_note = update.customer_note;
        }
        Ok(true)
    }

    async fn latest_order_in_status(
        &self,
        key: CartKey,
        status: OrderStatus,
    ) -> StoreResult<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .find(|o| o.chat_id == key.chat_id && o.bot_id == key.bot_id && o.status == status)
            .cloned())
    }

    async fn orders_for_chat(&self, key: CartKey, limit: i64) -> StoreResult<Vec<Order>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| o.chat_id == key.chat_id && o.bot_id == key.bot_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn orders_for_bot(&self, bot_id: Uuid) -> StoreResult<Vec<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| o.bot_id == bot_id)
            .cloned()
            .collect())
    }

    async fn transition_payout(
        &self,
        order_id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.payout_status == from)
        {
            Some(order) => {
                order.payout_status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
