//! Activation Gateway
//!
//! The one path from a provider confirmation to the subscription upsert.
//! The gateway never verifies payment itself; it only refuses to mutate
//! anything without a completed confirmation signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vibedoc_entitlements::{SubscriptionRecord, SubscriptionService};

/// Payment provider a confirmation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentProvider {
    /// PayPal order capture
    PayPal,
    /// UPI deep-link confirmation
    Upi,
}

/// Completed-payment signal from a provider flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Originating provider
    pub provider: PaymentProvider,
    /// Provider-side reference (order id or UPI transaction reference)
    pub reference: String,
    /// User the payment was made for
    pub user_id: Uuid,
    /// Amount paid
    pub amount: Decimal,
    /// Currency of the amount
    pub currency: String,
    /// Whether the provider reported the payment as completed
    pub completed: bool,
    /// When the provider confirmed
    pub confirmed_at: DateTime<Utc>,
}

/// Payment flow errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    /// No such order
    #[error("order not found")]
    OrderNotFound,
    /// Order is not in a capturable state
    #[error("invalid payment state")]
    InvalidState,
    /// No pending UPI intent under that reference
    #[error("unknown upi reference")]
    UnknownReference,
    /// Activation attempted without a completed-payment signal
    #[error("payment not confirmed")]
    NotConfirmed,
    /// The subscription upsert failed after a confirmed payment
    #[error("activation failed: {0}")]
    Activation(String),
}

/// Turns confirmed payments into a fresh Pro window
pub struct ActivationGateway {
    subscriptions: Arc<SubscriptionService>,
}

impl ActivationGateway {
    /// Create a gateway over the subscription service
    pub fn new(subscriptions: Arc<SubscriptionService>) -> Self {
        Self { subscriptions }
    }

    /// Upsert a fresh Pro window for the confirmed payment.
    ///
    /// A non-completed confirmation is rejected outright with no record
    /// mutation. A duplicated confirmation re-runs the upsert, which
    /// re-extends the window rather than stacking it.
    pub fn activate(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<SubscriptionRecord, PaymentError> {
        if !confirmation.completed {
            tracing::warn!(
                reference = %confirmation.reference,
                "activation rejected: payment not confirmed"
            );
            return Err(PaymentError::NotConfirmed);
        }

        let record = self
            .subscriptions
            .activate(confirmation.user_id)
            .map_err(|e| PaymentError::Activation(e.to_string()))?;
        tracing::info!(
            user_id = %confirmation.user_id,
            provider = ?confirmation.provider,
            reference = %confirmation.reference,
            "pro activated from payment"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vibedoc_entitlements::{
        EntitlementLimits, ManualClock, MemorySubscriptionStore, SubscriptionStatus,
    };
    use chrono::TimeZone;

    fn gateway() -> (ActivationGateway, Arc<SubscriptionService>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(MemorySubscriptionStore::new()),
            clock,
            EntitlementLimits::default(),
        ));
        (ActivationGateway::new(subscriptions.clone()), subscriptions)
    }

    fn confirmation(user_id: Uuid, completed: bool) -> PaymentConfirmation {
        PaymentConfirmation {
            provider: PaymentProvider::PayPal,
            reference: "PAYPAL-TEST".into(),
            user_id,
            amount: dec!(9.99),
            currency: "USD".into(),
            completed,
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmed_payment_activates() {
        let (gateway, subscriptions) = gateway();
        let user = Uuid::new_v4();

        let record = gateway.activate(&confirmation(user, true)).unwrap();

        assert_eq!(record.status, SubscriptionStatus::Pro);
        assert!(subscriptions.status(user).is_pro);
    }

    #[test]
    fn test_unconfirmed_payment_rejected() {
        let (gateway, subscriptions) = gateway();
        let user = Uuid::new_v4();

        let result = gateway.activate(&confirmation(user, false));

        assert!(matches!(result, Err(PaymentError::NotConfirmed)));
        assert!(!subscriptions.status(user).is_pro);
    }
}
