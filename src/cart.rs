//! Per-(chat, bot) shopping cart.
//!
//! Pure persistence: nothing here talks to Telegram.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ShopError;
use crate::shop_model::{Cart, CartItem, CartKey, CartLine};
use crate::store::ShopStore;

/// Contents of a cart as shown to the buyer
#[derive(Debug, Clone, PartialEq)]
pub enum CartView {
    /// No cart yet, or a cart without items
    Empty,
    Lines {
        cart_id: Uuid,
        lines: Vec<CartLine>,
        total: Decimal,
    },
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        matches!(self, CartView::Empty)
    }
}

/// Sum of quantity x unit price over all lines
pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

/// "2x ProductA (Standard), 1x ProductB (Large)"
pub fn order_description(lines: &[CartLine]) -> String {
    lines
        .iter()
        .map(CartLine::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn ShopStore>,
}

impl CartService {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// Add one unit of `tier_id`. The tier must belong to the cart's bot.
    pub async fn add(&self, key: CartKey, tier_id: Uuid) -> Result<CartItem, ShopError> {
        match self.store.price_tier_bot_id(tier_id).await? {
            Some(bot_id) if bot_id == key.bot_id => {}
            _ => return Err(ShopError::not_found("price tier", tier_id)),
        }

        let item = self.store.add_cart_item(key, tier_id).await?;
        debug!(
            chat_id = key.chat_id,
            cart_id = %item.cart_id,
            quantity = item.quantity,
            "Added item to cart"
        );
        Ok(item)
    }

    /// Delete one line of the key's own cart
    pub async fn remove(&self, key: CartKey, item_id: Uuid) -> Result<(), ShopError> {
        let cart = self
            .store
            .cart(key)
            .await?
            .ok_or_else(|| ShopError::not_found("cart item", item_id))?;
        if !self.store.remove_cart_item(cart.id, item_id).await? {
            return Err(ShopError::not_found("cart item", item_id));
        }
        Ok(())
    }

    /// Remove every line, keeping the cart
    pub async fn clear(&self, cart_id: Uuid) -> Result<u64, ShopError> {
        let removed = self.store.clear_cart(cart_id).await?;
        info!(cart_id = %cart_id, removed, "Cleared cart");
        Ok(removed)
    }

    pub async fn view(&self, key: CartKey) -> Result<CartView, ShopError> {
        let Some(cart) = self.store.cart(key).await? else {
            return Ok(CartView::Empty);
        };
        let lines = self.store.cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Ok(CartView::Empty);
        }
        let total = cart_total(&lines);
        Ok(CartView::Lines {
            cart_id: cart.id,
            lines,
            total,
        })
    }

    /// The cart with `cart_id`, only if it is the cart of `key`
    pub async fn owned_cart(&self, key: CartKey, cart_id: Uuid) -> Result<Cart, ShopError> {
        self.store
            .cart_by_id(cart_id)
            .await?
            .filter(|cart| cart.key() == key)
            .ok_or_else(|| ShopError::not_found("cart", cart_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(name: &str, tier: &str, price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            product_name: name.to_string(),
            tier_label: tier.to_string(),
            unit_price: price,
            quantity,
        }
    }

    #[test]
    fn test_total_and_description() {
        let lines = vec![
            line("ProductA", "Standard", dec!(10), 2),
            line("ProductB", "Large", dec!(25), 1),
        ];
        assert_eq!(cart_total(&lines), dec!(45));
        assert_eq!(
            order_description(&lines),
            "2x ProductA (Standard), 1x ProductB (Large)"
        );
    }

    #[test]
    fn test_empty_lines_total_zero() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
        assert_eq!(order_description(&[]), "");
    }
}
