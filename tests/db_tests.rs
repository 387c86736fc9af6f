use anyhow::{Context, Result};
use rust_decimal_macros::dec;
use shopbot::db::*;
use shopbot::order_lifecycle::{OrderStatus, PayoutStatus};
use shopbot::shop_model::{
    CartKey, NewBot, NewCategory, NewOrder, NewPriceTier, NewProduct, OrderUpdate,
};
use shopbot::store::ShopStore;
use sqlx::PgPool;
use std::env;
use uuid::Uuid;

/// Helper macro to skip tests when database is not available
macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match setup_test_db().await {
            Ok(pool) => $test_fn(PgStore::new(pool)).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

async fn setup_test_db() -> Result<PgPool> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping database tests: DATABASE_URL not set");
            return Err(anyhow::anyhow!("Test database not configured"));
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to test database")?;

    init_database_schema(&pool).await?;

    Ok(pool)
}

/// Each test gets its own bot so tests can share the schema
fn unique_token() -> String {
    let digits = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("{digits}:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw")
}

struct Fixture {
    bot_id: Uuid,
    category_id: Uuid,
    tier_id: Uuid,
}

async fn seed(store: &PgStore) -> Result<Fixture> {
    let bot = store
        .create_bot(NewBot {
            token: unique_token(),
            wallet: "TOwnerWallet".to_string(),
            welcome_message: None,
        })
        .await?;
    let category = store
        .create_category(NewCategory {
            bot_id: bot.id,
            name: "Goods".to_string(),
            parent_id: None,
        })
        .await?;
    let product = store
        .create_product(NewProduct {
            category_id: category.id,
            name: "ProductA".to_string(),
            description: None,
            unit: None,
            image_url: None,
            video_url: None,
            price_tiers: vec![NewPriceTier {
                label: "Standard".to_string(),
                price: dec!(10.00),
            }],
        })
        .await?;
    Ok(Fixture {
        bot_id: bot.id,
        category_id: category.id,
        tier_id: product.price_tiers[0].id,
    })
}

fn new_order(bot_id: Uuid, chat_id: i64) -> NewOrder {
    NewOrder {
        bot_id,
        chat_id,
        telegram_username: Some("alice".to_string()),
        language_code: Some("en".to_string()),
        description: "1x ProductA (Standard)".to_string(),
        price: dec!(10.00),
        pay_currency: "btc".to_string(),
    }
}

#[tokio::test]
async fn test_bot_operations() -> Result<()> {
    skip_if_no_db!(test_bot_operations_impl)
}

async fn test_bot_operations_impl(store: PgStore) -> Result<()> {
    let token = unique_token();
    let bot = store
        .create_bot(NewBot {
            token: token.clone(),
            wallet: "TOwnerWallet".to_string(),
            welcome_message: None,
        })
        .await?;
    assert!(bot.is_active);
    assert!(!bot.welcome_message.is_empty());

    let duplicate = store
        .create_bot(NewBot {
            token: token.clone(),
            wallet: "TOther".to_string(),
            welcome_message: None,
        })
        .await;
    assert!(duplicate.is_err());

    assert!(store.update_welcome_message(bot.id, "Hello").await?);
    assert!(store.set_bot_active(bot.id, false).await?);
    let found = store.bot_by_token(&token).await?.unwrap();
    assert_eq!(found.welcome_message, "Hello");
    assert!(!found.is_active);

    assert!(store.delete_bot(bot.id).await?);
    assert!(store.bot(bot.id).await?.is_none());
    assert!(!store.delete_bot(bot.id).await?);

    Ok(())
}

#[tokio::test]
async fn test_cart_upsert_and_lines() -> Result<()> {
    skip_if_no_db!(test_cart_upsert_and_lines_impl)
}

async fn test_cart_upsert_and_lines_impl(store: PgStore) -> Result<()> {
    let fixture = seed(&store).await?;
    let key = CartKey::new(4242, fixture.bot_id);

    let first = store.add_cart_item(key, fixture.tier_id).await?;
    let second = store.add_cart_item(key, fixture.tier_id).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 2);

    let cart = store.cart(key).await?.unwrap();
    let lines = store.cart_lines(cart.id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_name, "ProductA");
    assert_eq!(lines[0].line_total(), dec!(20.00));

    assert!(store.remove_cart_item(cart.id, first.id).await?);
    assert!(store.cart_lines(cart.id).await?.is_empty());

    store.add_cart_item(key, fixture.tier_id).await?;
    assert_eq!(store.clear_cart(cart.id).await?, 1);
    assert!(store.cart(key).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_category_delete_cascades_to_cart() -> Result<()> {
    skip_if_no_db!(test_category_delete_cascades_to_cart_impl)
}

async fn test_category_delete_cascades_to_cart_impl(store: PgStore) -> Result<()> {
    let fixture = seed(&store).await?;
    let key = CartKey::new(4242, fixture.bot_id);
    store.add_cart_item(key, fixture.tier_id).await?;
    let cart = store.cart(key).await?.unwrap();

    assert!(store.delete_category(fixture.category_id).await?);
    assert!(store.cart_lines(cart.id).await?.is_empty());
    assert!(store.price_tier_bot_id(fixture.tier_id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_order_transitions_are_compare_and_set() -> Result<()> {
    skip_if_no_db!(test_order_transitions_are_compare_and_set_impl)
}

async fn test_order_transitions_are_compare_and_set_impl(store: PgStore) -> Result<()> {
    let fixture = seed(&store).await?;
    let order = store.create_order(new_order(fixture.bot_id, 4242)).await?;
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert_eq!(order.payout_status, PayoutStatus::Unpaid);

    let applied = store
        .transition_order(
            order.id,
            OrderStatus::AwaitingPayment,
            OrderStatus::AwaitingAddress,
            OrderUpdate::default(),
        )
        .await?;
    assert!(applied);

    let replayed = store
        .transition_order(
            order.id,
            OrderStatus::AwaitingPayment,
            OrderStatus::AwaitingAddress,
            OrderUpdate::default(),
        )
        .await?;
    assert!(!replayed);

    store
        .transition_order(
            order.id,
            OrderStatus::AwaitingAddress,
            OrderStatus::AwaitingNote,
            OrderUpdate {
                shipping_address: Some("1 Main St".to_string()),
                customer_note: None,
            },
        )
        .await?;
    let stored = store.order(order.id).await?.unwrap();
    assert_eq!(stored.status, OrderStatus::AwaitingNote);
    assert_eq!(stored.shipping_address.as_deref(), Some("1 Main St"));

    assert!(
        store
            .transition_payout(order.id, PayoutStatus::Unpaid, PayoutStatus::Pending)
            .await?
    );
    assert!(
        !store
            .transition_payout(order.id, PayoutStatus::Unpaid, PayoutStatus::Pending)
            .await?
    );

    Ok(())
}

#[tokio::test]
async fn test_latest_order_in_status() -> Result<()> {
    skip_if_no_db!(test_latest_order_in_status_impl)
}

async fn test_latest_order_in_status_impl(store: PgStore) -> Result<()> {
    let fixture = seed(&store).await?;
    let key = CartKey::new(4242, fixture.bot_id);
    let older = store.create_order(new_order(fixture.bot_id, 4242)).await?;
    let newer = store.create_order(new_order(fixture.bot_id, 4242)).await?;
    store.create_order(new_order(fixture.bot_id, 7)).await?;

    let latest = store
        .latest_order_in_status(key, OrderStatus::AwaitingPayment)
        .await?
        .unwrap();
    assert_eq!(latest.id, newer.id);

    let history = store.orders_for_chat(key, 10).await?;
    assert_eq!(
        history.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
    assert_eq!(store.orders_for_bot(fixture.bot_id).await?.len(), 3);
    assert!(store
        .latest_order_in_status(key, OrderStatus::AwaitingAddress)
        .await?
        .is_none());

    Ok(())
}

#[tokio::test]
async fn test_consume_cart_lines_keeps_later_additions() -> Result<()> {
    skip_if_no_db!(test_consume_cart_lines_keeps_later_additions_impl)
}

async fn test_consume_cart_lines_keeps_later_additions_impl(store: PgStore) -> Result<()> {
    let fixture = seed(&store).await?;
    let key = CartKey::new(4242, fixture.bot_id);
    let item = store.add_cart_item(key, fixture.tier_id).await?;
    let ordered = store.cart_lines(item.cart_id).await?;

    store.add_cart_item(key, fixture.tier_id).await?;
    assert_eq!(store.consume_cart_lines(item.cart_id, &ordered).await?, 1);

    let lines = store.cart_lines(item.cart_id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 1);

    assert_eq!(store.consume_cart_lines(item.cart_id, &ordered).await?, 1);
    assert!(store.cart_lines(item.cart_id).await?.is_empty());

    Ok(())
}
