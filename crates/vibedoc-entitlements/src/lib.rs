//! Vibedoc Entitlement Platform (VEP)
//!
//! Tiered usage entitlement and quota accounting for README generation:
//! anonymous device-scoped counters, free (email, device) counters, and a
//! server-authoritative Pro daily quota inside a 30-day paid window.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENTITLEMENT PLATFORM (VEP)                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    ENTITLEMENT ENGINE                            │   │
//! │  │   Identity ─► Tier ─► Remaining Allowance ─► Consume One          │   │
//! │  └───────┬─────────────────────────────────────────────┬───────────┘   │
//! │          │                                             │               │
//! │  ┌───────▼──────────────┐                 ┌────────────▼────────────┐  │
//! │  │  DEVICE COUNTERS     │                 │  SUBSCRIPTION SERVICE   │  │
//! │  │  anon | email+device │                 │  status | consume |     │  │
//! │  │  saturating, no reset│                 │  activate (30d window)  │  │
//! │  └──────────────────────┘                 └────────────┬────────────┘  │
//! │                                                        │               │
//! │                                           ┌────────────▼────────────┐  │
//! │                                           │  SUBSCRIPTION STORE     │  │
//! │                                           │  atomic conditional RMW │  │
//! │                                           └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod clock;
pub mod config;
pub mod device;
pub mod engine;
pub mod identity;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EntitlementLimits;
pub use device::{CounterStore, DeviceStorage, MemoryStorage};
pub use engine::{EntitlementEngine, EntitlementError};
pub use identity::{resolve_tier, SessionInfo, Tier};
pub use subscription::{
    MemorySubscriptionStore, ProStatus, SubscriptionError, SubscriptionRecord,
    SubscriptionService, SubscriptionStatus, SubscriptionStore,
};
