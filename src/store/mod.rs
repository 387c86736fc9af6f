//! Persistence seam for the shop.
//!
//! Every method is one logical operation and must be atomic: a crash leaves
//! either the old or the new state. Status writes are compare-and-set so
//! duplicate webhook deliveries cannot apply a transition twice.
//!
//! Two implementations ship with the crate: [`crate::db::PgStore`] and the
//! in-process [`memory::MemoryStore`].

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::order_lifecycle::{OrderStatus, PayoutStatus};
use crate::shop_model::{
    Bot, Cart, CartItem, CartKey, CartLine, Category, NewBot, NewCategory, NewOrder,
    NewPriceTier, NewProduct, Order, OrderUpdate, PriceTier, ProductWithTiers,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ShopStore: Send + Sync {
    // Bots
    async fn create_bot(&self, bot: NewBot) -> StoreResult<Bot>;
    async fn bot(&self, bot_id: Uuid) -> StoreResult<Option<Bot>>;
    async fn bot_by_token(&self, token: &str) -> StoreResult<Option<Bot>>;
    async fn update_welcome_message(&self, bot_id: Uuid, message: &str) -> StoreResult<bool>;
    async fn set_bot_active(&self, bot_id: Uuid, active: bool) -> StoreResult<bool>;
    /// Cascades to the whole catalog, carts and orders of the bot
    async fn delete_bot(&self, bot_id: Uuid) -> StoreResult<bool>;

    // Catalog
    async fn create_category(&self, category: NewCategory) -> StoreResult<Category>;
    async fn category(&self, category_id: Uuid) -> StoreResult<Option<Category>>;
    async fn root_categories(&self, bot_id: Uuid) -> StoreResult<Vec<Category>>;
    async fn sub_categories(&self, category_id: Uuid) -> StoreResult<Vec<Category>>;
    /// Cascades to sub-categories and their products
    async fn delete_category(&self, category_id: Uuid) -> StoreResult<bool>;
    async fn create_product(&self, product: NewProduct) -> StoreResult<ProductWithTiers>;
    async fn products_with_tiers(&self, category_id: Uuid) -> StoreResult<Vec<ProductWithTiers>>;
    /// Owning bot of a product, through its category
    async fn product_bot_id(&self, product_id: Uuid) -> StoreResult<Option<Uuid>>;
    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool>;
    async fn add_price_tier(&self, product_id: Uuid, tier: NewPriceTier) -> StoreResult<PriceTier>;
    /// Owning bot of a price tier, through product and category
    async fn price_tier_bot_id(&self, tier_id: Uuid) -> StoreResult<Option<Uuid>>;
    /// Cascades to cart items referencing the tier
    async fn delete_price_tier(&self, tier_id: Uuid) -> StoreResult<bool>;

    // Carts
    /// Upsert the cart for `key` and the item for `tier_id` (quantity + 1)
    async fn add_cart_item(&self, key: CartKey, tier_id: Uuid) -> StoreResult<CartItem>;
    async fn cart(&self, key: CartKey) -> StoreResult<Option<Cart>>;
    async fn cart_by_id(&self, cart_id: Uuid) -> StoreResult<Option<Cart>>;
    /// Lines in insertion order
    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>>;
    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<bool>;
    /// Deletes every item, keeps the cart row; returns the number removed
    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64>;
    /// Take the quantities of `lines` out of the cart, deleting items that
    /// drop to zero. Items added after `lines` were read stay. Returns the
    /// number of items touched.
    async fn consume_cart_lines(&self, cart_id: Uuid, lines: &[CartLine]) -> StoreResult<u64>;

    // Orders
    async fn create_order(&self, order: NewOrder) -> StoreResult<Order>;
    async fn order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;
    /// Set `to` only if the order is currently in `from`; returns whether it applied
    async fn transition_order(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        update: OrderUpdate,
    ) -> StoreResult<bool>;
    /// Most recent order of the chat in `status`
    async fn latest_order_in_status(
        &self,
        key: CartKey,
        status: OrderStatus,
    ) -> StoreResult<Option<Order>>;
    /// Newest first
    async fn orders_for_chat(&self, key: CartKey, limit: i64) -> StoreResult<Vec<Order>>;
    /// Newest first
    async fn orders_for_bot(&self, bot_id: Uuid) -> StoreResult<Vec<Order>>;
    /// Payout compare-and-set, same contract as [`ShopStore::transition_order`]
    async fn transition_payout(
        &self,
        order_id: Uuid,
        from: PayoutStatus,
        to: PayoutStatus,
    ) -> StoreResult<bool>;
}
