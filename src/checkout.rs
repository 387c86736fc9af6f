//! Cart to order to provider invoice.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cart::{cart_total, order_description};
use crate::currency_cache::CurrencyCache;
use crate::errors::ShopError;
use crate::payments::{PaymentGateway, PaymentInvoice, PaymentRequest};
use crate::shop_model::{Buyer, Cart, CartLine, NewOrder, Order};
use crate::store::ShopStore;

/// Result of a successful checkout
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub invoice: PaymentInvoice,
}

pub struct CheckoutOrchestrator {
    store: Arc<dyn ShopStore>,
    gateway: Arc<dyn PaymentGateway>,
    currencies: Arc<CurrencyCache>,
    price_currency: String,
    ipn_callback_url: String,
}

impl CheckoutOrchestrator {
    pub fn new(
        store: Arc<dyn ShopStore>,
        gateway: Arc<dyn PaymentGateway>,
        currencies: Arc<CurrencyCache>,
        price_currency: impl Into<String>,
        ipn_callback_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            currencies,
            price_currency: price_currency.into(),
            ipn_callback_url: ipn_callback_url.into(),
        }
    }

    pub fn price_currency(&self) -> &str {
        &self.price_currency
    }

    async fn non_empty_lines(
        &self,
        cart_id: Uuid,
    ) -> Result<(Cart, Vec<CartLine>), ShopError> {
        let cart = self
            .store
            .cart_by_id(cart_id)
            .await?
            .ok_or_else(|| ShopError::not_found("cart", cart_id))?;
        let lines = self.store.cart_lines(cart_id).await?;
        if lines.is_empty() {
            return Err(ShopError::EmptyCart(cart_id));
        }
        Ok((cart, lines))
    }

    /// Currencies the buyer can pay with. An empty list means the provider
    /// was never reachable.
    pub async fn begin_checkout(&self, cart_id: Uuid) -> Result<Vec<String>, ShopError> {
        self.non_empty_lines(cart_id).await?;
        Ok(self.currencies.currencies().await)
    }

    /// Create the order and its invoice. The ordered lines leave the cart only
    /// once the provider has accepted the payment.
    pub async fn select_currency(
        &self,
        cart_id: Uuid,
        currency: &str,
        buyer: &Buyer,
    ) -> Result<CheckoutReceipt, ShopError> {
        let currency = currency.trim().to_lowercase();
        if currency.is_empty() {
            return Err(ShopError::Validation("currency is required".to_string()));
        }

        let (cart, lines) = self.non_empty_lines(cart_id).await?;
        let price = cart_total(&lines);
        let description = order_description(&lines);

        let order = self
            .store
            .create_order(NewOrder {
                bot_id: cart.bot_id,
                chat_id: cart.chat_id,
                telegram_username: buyer.username.clone(),
                language_code: buyer.language_code.clone(),
                description: description.clone(),
                price,
                pay_currency: currency.clone(),
            })
            .await?;
        info!(order_id = %order.id, chat_id = cart.chat_id, price = %price, currency = %currency, "Order created");

        let request = PaymentRequest {
            price_amount: price,
            price_currency: self.price_currency.clone(),
            pay_currency: currency,
            order_id: order.id,
            order_description: description,
            ipn_callback_url: self.ipn_callback_url.clone(),
        };

        let invoice = match self.gateway.create_payment(&request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Payment creation failed, cart kept");
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.consume_cart_lines(cart.id, &lines).await {
            // the invoice exists, so the order stands
            warn!(cart_id = %cart.id, order_id = %order.id, error = %e, "Failed to clear cart after checkout");
        }

        Ok(CheckoutReceipt { order, invoice })
    }
}
