//! PayPal Order Flow
//!
//! Order create/capture against the provider. The REST calls are
//! simulated at the boundary; only a captured order yields a completed
//! confirmation, and capture is the sole source of that signal.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activation::{PaymentConfirmation, PaymentError, PaymentProvider};

/// PayPal order lifecycle
pub struct PayPalGateway {
    orders: Arc<RwLock<HashMap<Uuid, PayPalOrder>>>,
}

impl PayPalGateway {
    /// Create a gateway with no orders
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an order for the Pro plan.
    ///
    /// In production this posts to `/v2/checkout/orders` and stores the
    /// provider's order id for the approval redirect.
    pub fn create_order(&self, user_id: Uuid, amount: Decimal, currency: &str) -> PayPalOrder {
        let order = PayPalOrder {
            id: Uuid::new_v4(),
            user_id,
            amount,
            currency: currency.to_string(),
            status: OrderStatus::Created,
            provider_order_id: format!("PAYPAL-{}", Uuid::new_v4().simple()),
            created_at: Utc::now(),
        };
        self.orders.write().insert(order.id, order.clone());
        tracing::debug!(order_id = %order.id, %user_id, "paypal order created");
        order
    }

    /// Capture a created order.
    ///
    /// In production this posts to `/v2/checkout/orders/{id}/capture`
    /// after the buyer approves. Capturing anything but a freshly
    /// created order fails, so a replayed capture cannot mint a second
    /// confirmation.
    pub fn capture_order(&self, order_id: Uuid) -> Result<PaymentConfirmation, PaymentError> {
        let mut orders = self.orders.write();
        let order = orders.get_mut(&order_id).ok_or(PaymentError::OrderNotFound)?;
        if order.status != OrderStatus::Created {
            return Err(PaymentError::InvalidState);
        }
        order.status = OrderStatus::Captured;

        Ok(PaymentConfirmation {
            provider: PaymentProvider::PayPal,
            reference: order.provider_order_id.clone(),
            user_id: order.user_id,
            amount: order.amount,
            currency: order.currency.clone(),
            completed: true,
            confirmed_at: Utc::now(),
        })
    }

    /// Look up an order
    pub fn get_order(&self, order_id: Uuid) -> Option<PayPalOrder> {
        self.orders.read().get(&order_id).cloned()
    }
}

impl Default for PayPalGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// A PayPal order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalOrder {
    /// Our order id
    pub id: Uuid,
    /// Purchasing user
    pub user_id: Uuid,
    /// Order amount
    pub amount: Decimal,
    /// Order currency
    pub currency: String,
    /// Lifecycle state
    pub status: OrderStatus,
    /// Provider-side order reference
    pub provider_order_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created, awaiting buyer approval and capture
    Created,
    /// Captured; payment confirmed
    Captured,
    /// Capture failed or was voided
    Failed,
}
