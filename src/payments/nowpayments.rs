//! NOWPayments-compatible HTTP client.
//!
//! Every call carries the `x-api-key` header and the configured request
//! timeout, and goes through a [`CircuitBreaker`]. Only the currency list is
//! retried, with jittered exponential backoff, since it is the one
//! idempotent call.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{PaymentConfig, RecoveryConfig};
use crate::errors::ProviderError;
use crate::payments::{PaymentGateway, PaymentInvoice, PaymentRequest, PayoutRequest};

#[derive(Debug, Deserialize)]
struct CurrenciesResponse {
    currencies: Vec<CurrencyEntry>,
}

/// Plain tickers, or objects when the account enables extended listings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CurrencyEntry {
    Ticker(String),
    Detailed { code: String },
}

impl CurrencyEntry {
    fn into_ticker(self) -> String {
        match self {
            CurrencyEntry::Ticker(t) => t.to_lowercase(),
            CurrencyEntry::Detailed { code } => code.to_lowercase(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PayoutBody {
    withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Serialize)]
struct Withdrawal {
    address: String,
    currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: rust_decimal::Decimal,
}

pub struct NowPaymentsClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl NowPaymentsClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.recovery.operation_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            recovery: config.recovery.clone(),
            breaker: CircuitBreaker::new(config.recovery.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        Ok(builder.header("x-api-key", key))
    }

    /// Send one request through the breaker and decode a JSON body
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ProviderError> {
        if self.breaker.is_open() {
            warn!("Payment provider circuit breaker is open, failing fast");
            return Err(ProviderError::CircuitOpen);
        }

        let response = match self.authorized(builder)?.send().await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure();
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                self.breaker.record_failure();
            }
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Payment provider rejected request");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        self.breaker.record_success();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .recovery
            .base_retry_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.recovery.max_retry_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

fn is_retryable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Http(_) => true,
        ProviderError::Rejected { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[async_trait]
impl PaymentGateway for NowPaymentsClient {
    async fn available_currencies(&self) -> Result<Vec<String>, ProviderError> {
        let mut attempt = 0;
        loop {
            let result: Result<CurrenciesResponse, ProviderError> =
                self.execute(self.http.get(self.url("currencies"))).await;
            match result {
                Ok(body) => {
                    let currencies: Vec<String> = body
                        .currencies
                        .into_iter()
                        .map(CurrencyEntry::into_ticker)
                        .collect();
                    debug!(count = currencies.len(), "Fetched provider currencies");
                    return Ok(currencies);
                }
                Err(e) if attempt < self.recovery.max_retries && is_retryable(&e) => {
                    let delay = self.backoff(attempt);
                    warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Retrying currency fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentInvoice, ProviderError> {
        let invoice: PaymentInvoice = self
            .execute(self.http.post(self.url("payment")).json(request))
            .await?;
        info!(
            order_id = %request.order_id,
            payment_id = %invoice.payment_id,
            pay_currency = %invoice.pay_currency,
            "Payment created"
        );
        Ok(invoice)
    }

    async fn create_payout(&self, request: &PayoutRequest) -> Result<(), ProviderError> {
        let body = PayoutBody {
            withdrawals: vec![Withdrawal {
                address: request.address.clone(),
                currency: request.currency.clone(),
                amount: request.amount,
            }],
        };
        let _: serde_json::Value = self
            .execute(self.http.post(self.url("payout")).json(&body))
            .await?;
        info!(order_id = %request.order_id, amount = %request.amount, "Payout created");
        Ok(())
    }
}
