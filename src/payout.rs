//! Settlement of paid orders to the shop owner's wallet.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ShopError;
use crate::order_lifecycle::{OrderStatus, PayoutStatus};
use crate::payments::{PaymentGateway, PayoutRequest};
use crate::store::ShopStore;

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutOutcome {
    Paid { amount: Decimal },
    Failed,
    /// Order not paid yet, or payout already claimed
    Skipped,
}

/// Owner's share: price minus commission, to the cent
pub fn payout_amount(price: Decimal, commission_rate: Decimal) -> Decimal {
    (price * (Decimal::ONE - commission_rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

pub struct PayoutService {
    store: Arc<dyn ShopStore>,
    gateway: Arc<dyn PaymentGateway>,
    commission_rate: Decimal,
    payout_currency: String,
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn ShopStore>,
        gateway: Arc<dyn PaymentGateway>,
        commission_rate: Decimal,
        payout_currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            commission_rate,
            payout_currency: payout_currency.into(),
        }
    }

    /// Pay the owner for `order_id` at most once
    pub async fn settle(&self, order_id: Uuid) -> Result<PayoutOutcome, ShopError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| ShopError::not_found("order", order_id))?;

        if order.status != OrderStatus::Paid {
            return Ok(PayoutOutcome::Skipped);
        }

        let claimed = self
            .store
            .transition_payout(order_id, PayoutStatus::Unpaid, PayoutStatus::Pending)
            .await?;
        if !claimed {
            info!(order_id = %order_id, "Payout already claimed");
            return Ok(PayoutOutcome::Skipped);
        }

        let Some(bot) = self.store.bot(order.bot_id).await? else {
            warn!(order_id = %order_id, "Bot gone before payout");
            self.finish(order_id, PayoutStatus::Failed).await?;
            return Ok(PayoutOutcome::Failed);
        };

        let amount = payout_amount(order.price, self.commission_rate);
        let request = PayoutRequest {
            address: bot.wallet.clone(),
            currency: self.payout_currency.clone(),
            amount,
            order_id,
        };

        match self.gateway.create_payout(&request).await {
            Ok(()) => {
                self.finish(order_id, PayoutStatus::Paid).await?;
                info!(order_id = %order_id, amount = %amount, currency = %self.payout_currency, "Payout sent");
                Ok(PayoutOutcome::Paid { amount })
            }
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Payout failed");
                self.finish(order_id, PayoutStatus::Failed).await?;
                Ok(PayoutOutcome::Failed)
            }
        }
    }

    async fn finish(&self, order_id: Uuid, to: PayoutStatus) -> Result<(), ShopError> {
        if !self
            .store
            .transition_payout(order_id, PayoutStatus::Pending, to)
            .await?
        {
            warn!(order_id = %order_id, to = %to, "Payout status changed concurrently");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payout_amount_keeps_commission() {
        assert_eq!(payout_amount(dec!(45), dec!(0.01)), dec!(44.55));
        assert_eq!(payout_amount(dec!(10.01), dec!(0.01)), dec!(9.91));
        assert_eq!(payout_amount(dec!(100), Decimal::ZERO), dec!(100));
    }
}
