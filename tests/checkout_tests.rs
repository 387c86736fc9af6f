mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{seeded_shop, ScriptedGateway, CHAT_ID};
use shopbot::cart::{CartService, CartView};
use shopbot::checkout::CheckoutOrchestrator;
use shopbot::currency_cache::{CurrencyCache, ManualClock};
use shopbot::errors::{ProviderError, ShopError};
use shopbot::order_lifecycle::{OrderStatus, PayoutStatus};
use shopbot::shop_model::{Buyer, CartKey};
use shopbot::store::ShopStore;

const IPN_URL: &str = "https://shop.example.com/webhook/payments";

fn checkout_for(
    store: Arc<dyn ShopStore>,
    gateway: Arc<ScriptedGateway>,
) -> CheckoutOrchestrator {
    let cache = Arc::new(CurrencyCache::new(
        gateway.clone(),
        Arc::new(ManualClock::new()),
        Duration::from_secs(3600),
    ));
    CheckoutOrchestrator::new(store, gateway, cache, "usd", IPN_URL)
}

fn buyer() -> Buyer {
    Buyer {
        chat_id: CHAT_ID,
        username: Some("alice".to_string()),
        language_code: Some("en".to_string()),
    }
}

#[tokio::test]
async fn test_repeated_adds_increment_quantity() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    cart.add(key, shop.tier_a()).await?;
    let item = cart.add(key, shop.tier_a()).await?;
    assert_eq!(item.quantity, 2);
    assert_eq!(shop.store.cart_count(), 1);
    assert_eq!(shop.store.cart_item_count(), 1);

    let CartView::Lines { lines, total, .. } = cart.view(key).await? else {
        panic!("cart should not be empty");
    };
    assert_eq!(lines.len(), 1);
    assert_eq!(total, dec!(20.00));
    Ok(())
}

#[tokio::test]
async fn test_tier_of_another_bot_is_rejected() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let stranger = CartKey::new(CHAT_ID, Uuid::new_v4());

    let err = cart.add(stranger, shop.tier_a()).await.unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));
    assert_eq!(shop.store.cart_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_carts_are_scoped_per_chat_and_bot() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());

    cart.add(CartKey::new(1, shop.bot.id), shop.tier_a()).await?;
    cart.add(CartKey::new(2, shop.bot.id), shop.tier_b()).await?;

    assert_eq!(shop.store.cart_count(), 2);
    assert!(cart.view(CartKey::new(3, shop.bot.id)).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_checkout_creates_order_and_consumes_cart() -> Result<()> {
    let shop = seeded_shop().await?;
    let gateway = Arc::new(ScriptedGateway::new(&["btc", "eth", "usdttrc20"]));
    let checkout = checkout_for(shop.dyn_store(), gateway.clone());
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    cart.add(key, shop.tier_a()).await?;
    cart.add(key, shop.tier_a()).await?;
    let item = cart.add(key, shop.tier_b()).await?;

    let currencies = checkout.begin_checkout(item.cart_id).await?;
    assert!(currencies.contains(&"btc".to_string()));

    let receipt = checkout.select_currency(item.cart_id, "BTC", &buyer()).await?;
    let order = &receipt.order;
    assert_eq!(order.price, dec!(45.00));
    assert_eq!(order.description, "2x ProductA (Standard), 1x ProductB (Large)");
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert_eq!(order.payout_status, PayoutStatus::Unpaid);
    assert_eq!(order.pay_currency, "btc");
    assert_eq!(order.telegram_username.as_deref(), Some("alice"));
    assert_eq!(receipt.invoice.pay_address, "TPayAddressForTests");

    let requests = gateway.payment_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].price_amount, dec!(45.00));
    assert_eq!(requests[0].price_currency, "usd");
    assert_eq!(requests[0].order_id, order.id);
    assert_eq!(requests[0].ipn_callback_url, IPN_URL);

    // Cart row survives, its items do not
    assert!(cart.view(key).await?.is_empty());
    assert_eq!(shop.store.cart_count(), 1);
    assert_eq!(shop.store.cart_item_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_keeps_cart() -> Result<()> {
    let shop = seeded_shop().await?;
    let gateway = Arc::new(ScriptedGateway::new(&["btc"]));
    gateway.fail_payments(true);
    let checkout = checkout_for(shop.dyn_store(), gateway.clone());
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    let item = cart.add(key, shop.tier_a()).await?;
    let err = checkout
        .select_currency(item.cart_id, "btc", &buyer())
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Provider(ProviderError::Rejected { .. })));

    // The order stays behind awaiting payment; the buyer can retry
    assert_eq!(shop.store.order_count(), 1);
    assert_eq!(shop.store.cart_item_count(), 1);

    gateway.fail_payments(false);
    let receipt = checkout.select_currency(item.cart_id, "btc", &buyer()).await?;
    assert_eq!(receipt.order.price, dec!(10.00));
    assert_eq!(shop.store.cart_item_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_empty_cart_checkout_creates_no_order() -> Result<()> {
    let shop = seeded_shop().await?;
    let gateway = Arc::new(ScriptedGateway::new(&["btc"]));
    let checkout = checkout_for(shop.dyn_store(), gateway.clone());
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    let item = cart.add(key, shop.tier_a()).await?;
    cart.clear(item.cart_id).await?;

    let err = checkout.begin_checkout(item.cart_id).await.unwrap_err();
    assert!(matches!(err, ShopError::EmptyCart(_)));
    let err = checkout
        .select_currency(item.cart_id, "btc", &buyer())
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::EmptyCart(_)));

    assert_eq!(shop.store.order_count(), 0);
    assert!(gateway.payment_requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_deleting_a_tier_removes_it_from_carts() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    cart.add(key, shop.tier_a()).await?;
    cart.add(key, shop.tier_b()).await?;
    assert!(shop.store.delete_price_tier(shop.tier_a()).await?);

    let CartView::Lines { lines, total, .. } = cart.view(key).await? else {
        panic!("cart should still hold ProductB");
    };
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_name, "ProductB");
    assert_eq!(total, dec!(25.00));
    Ok(())
}

#[tokio::test]
async fn test_removing_an_item_keeps_other_lines() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    let item_a = cart.add(key, shop.tier_a()).await?;
    cart.add(key, shop.tier_a()).await?;
    cart.add(key, shop.tier_b()).await?;
    cart.remove(key, item_a.id).await?;

    // The whole line goes, not one unit of it
    let CartView::Lines { lines, total, .. } = cart.view(key).await? else {
        panic!("ProductB should still be in the cart");
    };
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].describe(), "1x ProductB (Large)");
    assert_eq!(total, dec!(25.00));
    assert_eq!(shop.store.cart_count(), 1);
    assert_eq!(shop.store.cart_item_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_removing_another_chats_item_is_not_found() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let owner = CartKey::new(CHAT_ID, shop.bot.id);
    let intruder = CartKey::new(CHAT_ID + 1, shop.bot.id);

    let item = cart.add(owner, shop.tier_a()).await?;
    cart.add(intruder, shop.tier_b()).await?;

    let err = cart.remove(intruder, item.id).await.unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));
    assert_eq!(shop.store.cart_item_count(), 2);
    assert!(!cart.view(owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_checkout_keeps_items_added_after_lines_were_read() -> Result<()> {
    let shop = seeded_shop().await?;
    let cart = CartService::new(shop.dyn_store());
    let key = CartKey::new(CHAT_ID, shop.bot.id);

    let item = cart.add(key, shop.tier_a()).await?;
    let ordered = shop.store.cart_lines(item.cart_id).await?;

    // Added while the invoice was being created
    cart.add(key, shop.tier_a()).await?;
    cart.add(key, shop.tier_b()).await?;

    let touched = shop.store.consume_cart_lines(item.cart_id, &ordered).await?;
    assert_eq!(touched, 1);

    let CartView::Lines { lines, .. } = cart.view(key).await? else {
        panic!("later additions should remain");
    };
    let described: Vec<String> = lines.iter().map(|l| l.describe()).collect();
    assert_eq!(described, vec!["1x ProductA (Standard)", "1x ProductB (Large)"]);
    assert_eq!(shop.store.cart_item_count(), 2);
    Ok(())
}
