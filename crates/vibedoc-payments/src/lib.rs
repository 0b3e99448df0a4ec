//! Vibedoc Payment Activation
//!
//! Two independent provider flows culminate in the same effect: a
//! confirmed payment upserts a fresh 30-day Pro window through the
//! activation gateway. Payment verification belongs to the providers;
//! the gateway only refuses to act without a completed confirmation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      PAYMENT ACTIVATION                             │
//! │                                                                     │
//! │  ┌──────────────┐      ┌──────────────┐                             │
//! │  │   PayPal     │      │     UPI      │                             │
//! │  │ order/capture│      │ link/confirm │                             │
//! │  └──────┬───────┘      └──────┬───────┘                             │
//! │         │   PaymentConfirmation  │                                  │
//! │  ┌──────▼───────────────────────▼──────┐    ┌────────────────────┐  │
//! │  │        ACTIVATION GATEWAY           │───►│ SubscriptionService│  │
//! │  │  completed? ─► activate : reject    │    │  activate(user)    │  │
//! │  └─────────────────────────────────────┘    └────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod activation;
pub mod paypal;
pub mod upi;

pub use activation::{ActivationGateway, PaymentConfirmation, PaymentError, PaymentProvider};
pub use paypal::{OrderStatus, PayPalGateway, PayPalOrder};
pub use upi::{UpiConfig, UpiGateway, UpiIntent};
