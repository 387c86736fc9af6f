mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{seeded_shop, RecordingOutbox, ScriptedGateway, Shop, BOT_TOKEN, CHAT_ID};
use shopbot::bot::BotCommand;
use shopbot::config::{AppConfig, PaymentConfig};
use shopbot::currency_cache::ManualClock;
use shopbot::order_lifecycle::OrderStatus;
use shopbot::payments::ipn::{sign, SIGNATURE_HEADER, SIGNATURE_HEADER_ALIAS};
use shopbot::shop_model::{NewOrder, Order};
use shopbot::store::ShopStore;
use shopbot::web::{self, AppState};

const ADMIN_TOKEN: &str = "operator-secret";
const IPN_SECRET: &str = "ipn-secret";

struct Harness {
    shop: Shop,
    outbox: Arc<RecordingOutbox>,
    app: Router,
}

async fn harness() -> Result<Harness> {
    let shop = seeded_shop().await?;
    let outbox = Arc::new(RecordingOutbox::default());
    let config = AppConfig {
        database_url: "postgres://unused".to_string(),
        public_url: "https://shop.example.com".to_string(),
        bind_addr: "127.0.0.1:0".parse()?,
        admin_api_token: ADMIN_TOKEN.to_string(),
        log_json: false,
        payment: PaymentConfig {
            api_key: Some("key".to_string()),
            ipn_secret: Some(IPN_SECRET.to_string()),
            ..PaymentConfig::default()
        },
    };
    let state = AppState::new(
        &config,
        shop.dyn_store(),
        Arc::new(ScriptedGateway::new(&["btc"])),
        Arc::new(ManualClock::new()),
        outbox.clone(),
    );
    Ok(Harness {
        shop,
        outbox,
        app: web::router(Arc::new(state)),
    })
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<u8>)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, body.to_vec()))
}

fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Result<Request<Body>> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json");
    Ok(match body {
        Some(body) => builder.body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    })
}

async fn pending_order(shop: &Shop) -> Result<Order> {
    Ok(shop
        .store
        .create_order(NewOrder {
            bot_id: shop.bot.id,
            chat_id: CHAT_ID,
            telegram_username: None,
            language_code: Some("en".to_string()),
            description: "1x ProductA (Standard)".to_string(),
            price: dec!(10.00),
            pay_currency: "btc".to_string(),
        })
        .await?)
}

fn ipn_request(payload: &Value, signature: &str, header_name: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/webhook/payments")
        .header(header_name, signature)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))?)
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let h = harness().await?;
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let (status, body) = send(&h.app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body)?, json!({"status": "ok"}));
    Ok(())
}

#[tokio::test]
async fn test_signed_ipn_confirms_order_and_notifies_buyer() -> Result<()> {
    let h = harness().await?;
    let order = pending_order(&h.shop).await?;
    let payload = json!({
        "payment_id": 123,
        "order_id": order.id.to_string(),
        "payment_status": "finished",
        "pay_amount": 10,
        "price_amount": 10,
        "pay_currency": "btc",
    });
    let signature = sign(IPN_SECRET, &payload)?;

    let (status, _) = send(&h.app, ipn_request(&payload, &signature, SIGNATURE_HEADER)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.shop.store.order(order.id).await?.unwrap().status,
        OrderStatus::AwaitingAddress
    );

    let delivered = h.outbox.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, BOT_TOKEN);
    assert!(matches!(delivered[0].1, BotCommand::SendText { chat_id: CHAT_ID, .. }));

    // Redelivery with the provider's own header name changes nothing
    let (status, _) =
        send(&h.app, ipn_request(&payload, &signature, SIGNATURE_HEADER_ALIAS)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.outbox.commands().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_ipn_with_bad_signature_is_rejected() -> Result<()> {
    let h = harness().await?;
    let order = pending_order(&h.shop).await?;
    let payload = json!({
        "order_id": order.id.to_string(),
        "payment_status": "finished",
        "pay_amount": 10,
        "price_amount": 10,
    });
    let forged = sign("wrong-secret", &payload)?;

    let (status, _) = send(&h.app, ipn_request(&payload, &forged, SIGNATURE_HEADER)?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/webhook/payments")
        .body(Body::from(payload.to_string()))?;
    let (status, _) = send(&h.app, unsigned).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(
        h.shop.store.order(order.id).await?.unwrap().status,
        OrderStatus::AwaitingPayment
    );
    assert!(h.outbox.commands().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_telegram_webhook_dispatches_to_bot() -> Result<()> {
    let h = harness().await?;
    let update = json!({
        "update_id": 1,
        "message": {
            "message_id": 5,
            "date": 1_700_000_000,
            "chat": {"id": CHAT_ID, "type": "private", "first_name": "Alice"},
            "from": {"id": CHAT_ID, "is_bot": false, "first_name": "Alice"},
            "text": "/start"
        }
    });
    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhook/{BOT_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(update.to_string()))?;

    let (status, body) = send(&h.app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    assert_eq!(
        h.outbox.commands()[0].body(),
        Some("Welcome to the test shop")
    );
    Ok(())
}

#[tokio::test]
async fn test_telegram_webhook_always_acknowledges() -> Result<()> {
    let h = harness().await?;
    for (uri, body) in [
        ("/webhook/999:unknown", r#"{"update_id": 1}"#),
        ("/webhook/999:unknown", "not json"),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))?;
        let (status, _) = send(&h.app, request).await?;
        assert_eq!(status, StatusCode::OK);
    }
    assert!(h.outbox.commands().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_management_api_requires_token() -> Result<()> {
    let h = harness().await?;
    let request = Request::builder()
        .uri(format!("/api/bots/{}", h.shop.bot.id))
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())?;
    let (status, _) = send(&h.app, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &h.app,
        admin_request("GET", &format!("/api/bots/{}", h.shop.bot.id), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let bot: Value = serde_json::from_slice(&body)?;
    assert_eq!(bot["wallet"], "TOwnerWallet");
    assert_eq!(bot["token"], "123456789:...");
    Ok(())
}

#[tokio::test]
async fn test_register_bot_sets_webhook() -> Result<()> {
    let h = harness().await?;
    let token = "555555555:CCHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";
    let (status, _) = send(
        &h.app,
        admin_request(
            "POST",
            "/api/bots",
            Some(json!({"bot_token": token, "wallet_address": "TNewWallet"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        h.outbox.webhooks.lock().unwrap().clone(),
        vec![(
            token.to_string(),
            format!("https://shop.example.com/webhook/{token}")
        )]
    );

    let (status, _) = send(
        &h.app,
        admin_request(
            "POST",
            "/api/bots",
            Some(json!({"bot_token": token, "wallet_address": "TNewWallet"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &h.app,
        admin_request(
            "POST",
            "/api/bots",
            Some(json!({"bot_token": "nope", "wallet_address": "TNewWallet"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_catalog_management_round() -> Result<()> {
    let h = harness().await?;
    let bot_id = h.shop.bot.id;

    let (status, body) = send(
        &h.app,
        admin_request(
            "POST",
            &format!("/api/bots/{bot_id}/categories"),
            Some(json!({"name": "Tea", "parent_id": h.shop.category.id})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let category: Value = serde_json::from_slice(&body)?;

    let (status, body) = send(
        &h.app,
        admin_request(
            "POST",
            &format!("/api/bots/{bot_id}/products"),
            Some(json!({
                "category_id": category["id"],
                "name": "Green tea",
                "unit": "g",
                "price_tiers": [{"label": "100g", "price": "4.50"}]
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let product: Value = serde_json::from_slice(&body)?;
    assert_eq!(product["product"]["unit"], "g");

    let (status, _) = send(
        &h.app,
        admin_request(
            "POST",
            &format!("/api/bots/{bot_id}/products"),
            Some(json!({
                "category_id": category["id"],
                "name": "Free tea",
                "price_tiers": []
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tier_id = product["price_tiers"][0]["id"].as_str().unwrap_or_default().to_string();
    let (status, _) = send(
        &h.app,
        admin_request("DELETE", &format!("/api/price-tiers/{tier_id}"), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &h.app,
        admin_request("DELETE", &format!("/api/price-tiers/{tier_id}"), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &h.app,
        admin_request("GET", &format!("/api/bots/{bot_id}/orders"), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body)?, json!([]));
    Ok(())
}
