//! UPI Deep-Link Flow
//!
//! Builds the `upi://pay` deep link the client renders as a QR code and
//! tracks pending intents by transaction reference. Confirmation arrives
//! out of band (operator check or provider webhook); confirming a pending
//! reference is what produces the completed-payment signal.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activation::{PaymentConfirmation, PaymentError, PaymentProvider};

/// Payee details embedded in every deep link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpiConfig {
    /// Payee virtual payment address
    pub payee_vpa: String,
    /// Payee display name
    pub payee_name: String,
}

/// UPI intent lifecycle
pub struct UpiGateway {
    config: UpiConfig,
    pending: Arc<RwLock<HashMap<String, UpiIntent>>>,
}

impl UpiGateway {
    /// Create a gateway for the configured payee
    pub fn new(config: UpiConfig) -> Self {
        Self {
            config,
            pending: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a deep link and register the pending intent under a fresh
    /// transaction reference
    pub fn create_intent(&self, user_id: Uuid, amount: Decimal) -> UpiIntent {
        let reference = format!("VIBEDOC{}", Uuid::new_v4().simple());
        let link = format!(
            "upi://pay?pa={}&pn={}&am={}&cu=INR&tr={}",
            self.config.payee_vpa,
            self.config.payee_name.replace(' ', "%20"),
            amount,
            reference,
        );
        let intent = UpiIntent {
            reference: reference.clone(),
            user_id,
            amount,
            link,
            confirmed: false,
            created_at: Utc::now(),
        };
        self.pending.write().insert(reference, intent.clone());
        tracing::debug!(reference = %intent.reference, %user_id, "upi intent created");
        intent
    }

    /// Confirm a pending reference.
    ///
    /// Idempotent on the stored intent but only the first confirmation
    /// yields a confirmation signal; replays fail like an unknown state.
    pub fn confirm(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        let mut pending = self.pending.write();
        let intent = pending
            .get_mut(reference)
            .ok_or(PaymentError::UnknownReference)?;
        if intent.confirmed {
            return Err(PaymentError::InvalidState);
        }
        intent.confirmed = true;

        Ok(PaymentConfirmation {
            provider: PaymentProvider::Upi,
            reference: intent.reference.clone(),
            user_id: intent.user_id,
            amount: intent.amount,
            currency: "INR".into(),
            completed: true,
            confirmed_at: Utc::now(),
        })
    }

    /// Look up a pending intent
    pub fn get_intent(&self, reference: &str) -> Option<UpiIntent> {
        self.pending.read().get(reference).cloned()
    }
}

/// A pending UPI payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpiIntent {
    /// Transaction reference embedded in the link
    pub reference: String,
    /// Paying user
    pub user_id: Uuid,
    /// Amount requested
    pub amount: Decimal,
    /// The `upi://pay` deep link
    pub link: String,
    /// Whether the reference has been confirmed
    pub confirmed: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
