//! Shared fixtures for the integration tests: a scripted payment gateway,
//! an outbox that records instead of sending, and a seeded catalog.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use shopbot::bot::{BotCommand, Outbox};
use shopbot::errors::ProviderError;
use shopbot::payments::{PaymentGateway, PaymentInvoice, PaymentRequest, PayoutRequest};
use shopbot::shop_model::{
    Bot, Category, NewBot, NewCategory, NewPriceTier, NewProduct, ProductWithTiers,
};
use shopbot::store::memory::MemoryStore;
use shopbot::store::ShopStore;

pub const BOT_TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";
pub const CHAT_ID: i64 = 4242;

fn rejected() -> ProviderError {
    ProviderError::Rejected {
        status: 500,
        body: "scripted failure".to_string(),
    }
}

/// Gateway whose answers are set by the test
pub struct ScriptedGateway {
    currencies: Mutex<Option<Vec<String>>>,
    fail_payments: Mutex<bool>,
    fail_payouts: Mutex<bool>,
    pub currency_calls: Mutex<usize>,
    pub payments: Mutex<Vec<PaymentRequest>>,
    pub payouts: Mutex<Vec<PayoutRequest>>,
}

impl ScriptedGateway {
    pub fn new(currencies: &[&str]) -> Self {
        Self {
            currencies: Mutex::new(Some(currencies.iter().map(|c| c.to_string()).collect())),
            fail_payments: Mutex::new(false),
            fail_payouts: Mutex::new(false),
            currency_calls: Mutex::new(0),
            payments: Mutex::new(Vec::new()),
            payouts: Mutex::new(Vec::new()),
        }
    }

    /// `None` makes the currency call fail
    pub fn set_currencies(&self, currencies: Option<&[&str]>) {
        *self.currencies.lock().unwrap() =
            currencies.map(|list| list.iter().map(|c| c.to_string()).collect());
    }

    pub fn fail_payments(&self, fail: bool) {
        *self.fail_payments.lock().unwrap() = fail;
    }

    pub fn fail_payouts(&self, fail: bool) {
        *self.fail_payouts.lock().unwrap() = fail;
    }

    pub fn currency_call_count(&self) -> usize {
        *self.currency_calls.lock().unwrap()
    }

    pub fn payment_requests(&self) -> Vec<PaymentRequest> {
        self.payments.lock().unwrap().clone()
    }

    pub fn payout_requests(&self) -> Vec<PayoutRequest> {
        self.payouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn available_currencies(&self) -> Result<Vec<String>, ProviderError> {
        *self.currency_calls.lock().unwrap() += 1;
        self.currencies.lock().unwrap().clone().ok_or_else(rejected)
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInvoice, ProviderError> {
        self.payments.lock().unwrap().push(request.clone());
        if *self.fail_payments.lock().unwrap() {
            return Err(rejected());
        }
        Ok(PaymentInvoice {
            payment_id: "5077125051".to_string(),
            pay_address: "TPayAddressForTests".to_string(),
            pay_amount: dec!(0.00123),
            pay_currency: request.pay_currency.clone(),
        })
    }

    async fn create_payout(&self, request: &PayoutRequest) -> Result<(), ProviderError> {
        self.payouts.lock().unwrap().push(request.clone());
        if *self.fail_payouts.lock().unwrap() {
            return Err(rejected());
        }
        Ok(())
    }
}

/// Outbox that keeps everything it is asked to deliver
#[derive(Default)]
pub struct RecordingOutbox {
    pub delivered: Mutex<Vec<(String, BotCommand)>>,
    pub webhooks: Mutex<Vec<(String, String)>>,
}

impl RecordingOutbox {
    pub fn commands(&self) -> Vec<BotCommand> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn deliver(&self, bot_token: &str, commands: Vec<BotCommand>) {
        let mut delivered = self.delivered.lock().unwrap();
        for command in commands {
            delivered.push((bot_token.to_string(), command));
        }
    }

    async fn register_webhook(&self, bot_token: &str, url: &str) -> anyhow::Result<()> {
        self.webhooks
            .lock()
            .unwrap()
            .push((bot_token.to_string(), url.to_string()));
        Ok(())
    }
}

/// A bot with one category holding ProductA (Standard, 10.00) and
/// ProductB (Large, 25.00)
pub struct Shop {
    pub store: Arc<MemoryStore>,
    pub bot: Bot,
    pub category: Category,
    pub product_a: ProductWithTiers,
    pub product_b: ProductWithTiers,
}

impl Shop {
    pub fn tier_a(&self) -> Uuid {
        self.product_a.price_tiers[0].id
    }

    pub fn tier_b(&self) -> Uuid {
        self.product_b.price_tiers[0].id
    }

    pub fn dyn_store(&self) -> Arc<dyn ShopStore> {
        self.store.clone()
    }
}

pub fn new_product(category_id: Uuid, name: &str, price: Decimal) -> NewProduct {
    NewProduct {
        category_id,
        name: name.to_string(),
        description: Some(format!("{name} description")),
        unit: None,
        image_url: None,
        video_url: None,
        price_tiers: vec![NewPriceTier {
            label: "Standard".to_string(),
            price,
        }],
    }
}

pub async fn seeded_shop() -> anyhow::Result<Shop> {
    let store = Arc::new(MemoryStore::new());
    let bot = store
        .create_bot(NewBot {
            token: BOT_TOKEN.to_string(),
            wallet: "TOwnerWallet".to_string(),
            welcome_message: Some("Welcome to the test shop".to_string()),
        })
        .await?;
    let category = store
        .create_category(NewCategory {
            bot_id: bot.id,
            name: "Goods".to_string(),
            parent_id: None,
        })
        .await?;
    let product_a = store
        .create_product(new_product(category.id, "ProductA", dec!(10.00)))
        .await?;
    let mut large = new_product(category.id, "ProductB", dec!(25.00));
    large.price_tiers[0].label = "Large".to_string();
    let product_b = store.create_product(large).await?;

    Ok(Shop {
        store,
        bot,
        category,
        product_a,
        product_b,
    })
}
