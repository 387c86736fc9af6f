//! # HTTP Surface
//!
//! One axum router serves every inbound request:
//!
//! - `POST /webhook/{token}`: Telegram updates for a registered bot, always `200 ok`
//! - `POST /webhook/payments`: signed payment notifications
//! - `GET /health`
//! - `/api/...`: bot registration and catalog management, behind a bearer token

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use teloxide::types::Update;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::admin::ShopAdmin;
use crate::bot::{ConversationDispatcher, InboundUpdate, Outbox};
use crate::checkout::CheckoutOrchestrator;
use crate::config::AppConfig;
use crate::currency_cache::{Clock, CurrencyCache};
use crate::errors::ShopError;
use crate::payments::ipn::{
    verify_ipn, IpnOutcome, PaymentConfirmationHandler, PaymentEvent, SIGNATURE_HEADER,
    SIGNATURE_HEADER_ALIAS,
};
use crate::payments::PaymentGateway;
use crate::payout::PayoutService;
use crate::shop_model::{
    token_snippet, Bot, Category, NewBot, NewPriceTier, NewProduct, Order, PriceTier,
    ProductWithTiers,
};
use crate::store::ShopStore;

/// Everything the request handlers share
pub struct AppState {
    pub store: Arc<dyn ShopStore>,
    pub dispatcher: Arc<ConversationDispatcher>,
    pub payments: Arc<PaymentConfirmationHandler>,
    pub admin: Arc<ShopAdmin>,
    pub outbox: Arc<dyn Outbox>,
    /// Shared secret for payment notification signatures
    pub ipn_secret: Option<String>,
    /// Externally reachable base URL, without trailing slash
    pub public_url: String,
    pub admin_api_token: String,
}

impl AppState {
    /// Wire the shop services over `store` and `gateway`
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ShopStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        outbox: Arc<dyn Outbox>,
    ) -> Self {
        let payment = &config.payment;
        let currencies = Arc::new(CurrencyCache::new(
            gateway.clone(),
            clock,
            payment.currency_cache_ttl(),
        ));
        let checkout = Arc::new(CheckoutOrchestrator::new(
            store.clone(),
            gateway.clone(),
            currencies,
            payment.price_currency.clone(),
            config.ipn_callback_url(),
        ));
        let payout = Arc::new(PayoutService::new(
            store.clone(),
            gateway,
            payment.commission_rate,
            payment.payout_currency.clone(),
        ));

        Self {
            dispatcher: Arc::new(ConversationDispatcher::new(store.clone(), checkout, payout)),
            payments: Arc::new(PaymentConfirmationHandler::new(
                store.clone(),
                payment.amount_scale,
            )),
            admin: Arc::new(ShopAdmin::new(store.clone())),
            store,
            outbox,
            ipn_secret: payment.ipn_secret.clone(),
            public_url: config.public_url.clone(),
            admin_api_token: config.admin_api_token.clone(),
        }
    }

    pub fn telegram_webhook_url(&self, bot_token: &str) -> String {
        format!("{}/webhook/{}", self.public_url, bot_token)
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/bots", post(register_bot))
        .route("/bots/{id}", get(get_bot).delete(delete_bot))
        .route("/bots/{id}/welcome-message", post(set_welcome_message))
        .route("/bots/{id}/active", post(set_active))
        .route("/bots/{id}/categories", post(create_category))
        .route("/bots/{id}/products", post(create_product))
        .route("/bots/{id}/orders", get(list_orders))
        .route("/categories/{id}", delete(delete_category))
        .route("/products/{id}", delete(delete_product))
        .route("/products/{id}/price-tiers", post(add_price_tier))
        .route("/price-tiers/{id}", delete(delete_price_tier))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/webhook/payments", post(payment_webhook))
        .route("/webhook/{token}", post(telegram_webhook))
        .nest("/api", api)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Telegram retries any non-2xx answer, so every outcome is acknowledged
async fn telegram_webhook(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    body: Bytes,
) -> &'static str {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(token = %token_snippet(&token), error = %e, "Unparseable Telegram update");
            return "ok";
        }
    };

    let bot = match state.store.bot_by_token(&token).await {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            warn!(token = %token_snippet(&token), "Update for an unknown bot token");
            return "ok";
        }
        Err(e) => {
            error!(token = %token_snippet(&token), error = %e, "Bot lookup failed");
            return "ok";
        }
    };

    let commands = state
        .dispatcher
        .dispatch(&bot, InboundUpdate::from_update(&update))
        .await;
    if !commands.is_empty() {
        state.outbox.deliver(&bot.token, commands).await;
    }
    "ok"
}

async fn payment_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER_ALIAS))
        .and_then(|value| value.to_str().ok());

    let payload = match verify_ipn(state.ipn_secret.as_deref(), signature, &body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected payment notification");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let event = match PaymentEvent::from_value(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Signed payment notification without a usable event");
            return (StatusCode::OK, "ok").into_response();
        }
    };

    match state.payments.handle(&event).await {
        Ok(IpnOutcome::Applied {
            order,
            bot: Some(bot),
            commands,
        }) => {
            debug!(order_id = %order.id, status = %order.status, "Notifying buyer");
            if !commands.is_empty() {
                state.outbox.deliver(&bot.token, commands).await;
            }
        }
        Ok(IpnOutcome::Applied { order, bot: None, .. }) => {
            warn!(order_id = %order.id, "Order bot was deleted, buyer not notified");
        }
        Ok(IpnOutcome::Ignored { reason }) => {
            debug!(order_id = %event.order_id, reason, "Payment notification ignored");
        }
        Ok(IpnOutcome::Unchanged { order_id }) => {
            debug!(order_id = %order_id, payment_status = %event.payment_status, "Payment still in progress");
        }
        Err(e) => {
            error!(order_id = %event.order_id, error = %e, "Failed to apply payment notification");
            return (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response();
        }
    }

    (StatusCode::OK, "ok").into_response()
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn require_admin_token(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), state.admin_api_token.as_bytes()));

    if !authorized {
        warn!(path = %request.uri().path(), "Rejected management API request");
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Management API failure, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Shop(ShopError),
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        ApiError::Shop(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Shop(err) => {
                let status = match &err {
                    ShopError::NotFound { .. } => StatusCode::NOT_FOUND,
                    ShopError::EmptyCart(_) | ShopError::Validation(_) => StatusCode::BAD_REQUEST,
                    ShopError::Conflict(_) | ShopError::IllegalTransition { .. } => {
                        StatusCode::CONFLICT
                    }
                    ShopError::Provider(_) => StatusCode::BAD_GATEWAY,
                    ShopError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %err, "Management API request failed");
                    (status, "internal error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct RegisterBotRequest {
    pub bot_token: String,
    pub wallet_address: String,
    pub welcome_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WelcomeMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// A bot as shown to the operator; the token is never echoed back in full
#[derive(Debug, Serialize, Deserialize)]
pub struct BotResponse {
    pub id: Uuid,
    pub token: String,
    pub wallet: String,
    pub welcome_message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Bot> for BotResponse {
    fn from(bot: Bot) -> Self {
        Self {
            id: bot.id,
            token: bot.token_snippet(),
            wallet: bot.wallet,
            welcome_message: bot.welcome_message,
            is_active: bot.is_active,
            created_at: bot.created_at,
        }
    }
}

async fn register_bot(
    State(state): State<SharedState>,
    Json(request): Json<RegisterBotRequest>,
) -> ApiResult<(StatusCode, Json<BotResponse>)> {
    let bot = state
        .admin
        .register_bot(NewBot {
            token: request.bot_token,
            wallet: request.wallet_address,
            welcome_message: request.welcome_message,
        })
        .await?;

    let url = state.telegram_webhook_url(&bot.token);
    match state.outbox.register_webhook(&bot.token, &url).await {
        Ok(()) => info!(bot_id = %bot.id, "Webhook set for new bot"),
        Err(e) => warn!(bot_id = %bot.id, error = %e, "Could not set webhook for new bot"),
    }

    Ok((StatusCode::CREATED, Json(bot.into())))
}

async fn get_bot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BotResponse>> {
    Ok(Json(state.admin.bot(id).await?.into()))
}

async fn delete_bot(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.admin.delete_bot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_welcome_message(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<WelcomeMessageRequest>,
) -> ApiResult<Json<BotResponse>> {
    let bot = state.admin.set_welcome_message(id, &request.message).await?;
    Ok(Json(bot.into()))
}

async fn set_active(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActiveRequest>,
) -> ApiResult<Json<BotResponse>> {
    let bot = state.admin.set_active(id, request.active).await?;
    Ok(Json(bot.into()))
}

async fn create_category(
    State(state): State<SharedState>,
    Path(bot_id): Path<Uuid>,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state
        .admin
        .create_category(bot_id, &request.name, request.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn delete_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.admin.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_product(
    State(state): State<SharedState>,
    Path(bot_id): Path<Uuid>,
    Json(request): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<ProductWithTiers>)> {
    let product = state.admin.create_product(bot_id, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn delete_product(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.admin.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_price_tier(
    State(state): State<SharedState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<NewPriceTier>,
) -> ApiResult<(StatusCode, Json<PriceTier>)> {
    let tier = state.admin.add_price_tier(product_id, request).await?;
    Ok((StatusCode::CREATED, Json(tier)))
}

async fn delete_price_tier(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.admin.delete_price_tier(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_orders(
    State(state): State<SharedState>,
    Path(bot_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.admin.orders(bot_id).await?))
}
