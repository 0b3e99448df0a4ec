//! Subscription Records and Server-Authoritative Quota
//!
//! One durable record per user carries the subscription window and
//! today's usage. The record is mutated only through the operations here:
//! the status query (with its lazy daily reset), the atomic consume, and
//! the payment-capture activation upsert.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{same_calendar_day, start_of_day, Clock};
use crate::config::EntitlementLimits;

/// Subscription state stored per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// No subscription has ever been activated
    None,
    /// A Pro window has been purchased (may have expired)
    Pro,
}

/// Durable per-user subscription record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Durable user identity the record is keyed by
    pub user_id: Uuid,
    /// Stored subscription state
    pub status: SubscriptionStatus,
    /// Start of the paid window
    pub period_start: DateTime<Utc>,
    /// End of the paid window; expiry is implicit via `now < period_end`
    pub period_end: DateTime<Utc>,
    /// Uses allowed per calendar day
    pub daily_limit: u32,
    /// Uses consumed against `last_reset_at`'s calendar day
    pub uses_today: u32,
    /// Start of the day `uses_today` is counted against
    pub last_reset_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Active Pro iff the status is pro and the window has not ended
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Pro && now < self.period_end
    }
}

/// Server-reported Pro standing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProStatus {
    /// Whether the account holds an active Pro window right now
    pub is_pro: bool,
    /// Uses left today; 0 whenever `is_pro` is false
    pub remaining_today: u32,
    /// Daily allowance of the plan
    pub daily_limit: u32,
    /// End of the current window, when one exists
    pub period_end: Option<DateTime<Utc>>,
}

impl ProStatus {
    /// The fail-closed default: not Pro, nothing remaining
    pub fn inactive() -> Self {
        Self {
            is_pro: false,
            remaining_today: 0,
            daily_limit: 0,
            period_end: None,
        }
    }
}

/// Subscription operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Record missing, inactive, or expired
    #[error("no active pro subscription")]
    NotPro,
    /// Today's quota is exhausted; no mutation occurred
    #[error("daily limit reached")]
    DailyLimitReached,
    /// Storage failed; never to be treated as granted access
    #[error("subscription storage error: {0}")]
    Storage(String),
}

/// Durable store for subscription records.
///
/// `update_if` is the one write path for in-place mutation: the closure
/// runs against the stored record under the store's write lock and the
/// result commits only when it returns `true`. Check-then-increment races
/// between callers are closed here, not in the service.
pub trait SubscriptionStore: Send + Sync {
    /// Load the record for a user
    fn load(&self, user_id: Uuid) -> Result<Option<SubscriptionRecord>, SubscriptionError>;

    /// Create or overwrite the record for a user
    fn upsert(&self, record: SubscriptionRecord) -> Result<(), SubscriptionError>;

    /// Atomic read-modify-write. Returns the stored record after the call
    /// (mutated when the closure committed, untouched otherwise), or
    /// `None` when no record exists for the user.
    fn update_if(
        &self,
        user_id: Uuid,
        apply: &mut dyn FnMut(&mut SubscriptionRecord) -> bool,
    ) -> Result<Option<SubscriptionRecord>, SubscriptionError>;
}

/// In-memory subscription store
#[derive(Default)]
pub struct MemorySubscriptionStore {
    records: RwLock<HashMap<Uuid, SubscriptionRecord>>,
}

impl MemorySubscriptionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn load(&self, user_id: Uuid) -> Result<Option<SubscriptionRecord>, SubscriptionError> {
        Ok(self.records.read().get(&user_id).cloned())
    }

    fn upsert(&self, record: SubscriptionRecord) -> Result<(), SubscriptionError> {
        self.records.write().insert(record.user_id, record);
        Ok(())
    }

    fn update_if(
        &self,
        user_id: Uuid,
        apply: &mut dyn FnMut(&mut SubscriptionRecord) -> bool,
    ) -> Result<Option<SubscriptionRecord>, SubscriptionError> {
        let mut records = self.records.write();
        let Some(stored) = records.get_mut(&user_id) else {
            return Ok(None);
        };
        let mut candidate = stored.clone();
        if apply(&mut candidate) {
            *stored = candidate.clone();
            Ok(Some(candidate))
        } else {
            Ok(Some(stored.clone()))
        }
    }
}

/// Server-authoritative subscription operations
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
    limits: EntitlementLimits,
}

impl SubscriptionService {
    /// Create the service over a store and clock
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        clock: Arc<dyn Clock>,
        limits: EntitlementLimits,
    ) -> Self {
        Self {
            store,
            clock,
            limits,
        }
    }

    /// Pro standing for a user.
    ///
    /// Lazily resets the daily counter when the stored day is stale.
    /// Storage failures degrade to the inactive status rather than
    /// propagating; access is never granted on an infrastructure error.
    pub fn status(&self, user_id: Uuid) -> ProStatus {
        match self.read_status(user_id) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "status read failed; reporting inactive");
                ProStatus::inactive()
            }
        }
    }

    fn read_status(&self, user_id: Uuid) -> Result<ProStatus, SubscriptionError> {
        let now = self.clock.now();
        let Some(mut record) = self.store.load(user_id)? else {
            return Ok(ProStatus::inactive());
        };
        if !record.is_active(now) {
            return Ok(ProStatus::inactive());
        }

        if !same_calendar_day(record.last_reset_at, now) {
            // Lazy reset, persisted before the remaining count is computed
            if let Some(updated) = self.store.update_if(user_id, &mut |r| {
                if same_calendar_day(r.last_reset_at, now) {
                    return false;
                }
                r.uses_today = 0;
                r.last_reset_at = start_of_day(now);
                r.updated_at = now;
                true
            })? {
                record = updated;
            }
        }

        Ok(ProStatus {
            is_pro: true,
            remaining_today: record.daily_limit.saturating_sub(record.uses_today),
            daily_limit: record.daily_limit,
            period_end: Some(record.period_end),
        })
    }

    /// Consume one Pro use and return the remaining count for today.
    ///
    /// Re-validates entitlement server side on every call; the client's
    /// cached belief is never trusted. The guard and increment run under
    /// the store lock, so two callers racing for the last unit cannot
    /// both succeed. A denial leaves the record untouched.
    pub fn consume(&self, user_id: Uuid) -> Result<u32, SubscriptionError> {
        let now = self.clock.now();
        let mut outcome = Err(SubscriptionError::NotPro);
        let stored = self.store.update_if(user_id, &mut |record| {
            if !record.is_active(now) {
                outcome = Err(SubscriptionError::NotPro);
                return false;
            }
            if !same_calendar_day(record.last_reset_at, now) {
                record.uses_today = 0;
            }
            if record.uses_today >= record.daily_limit {
                outcome = Err(SubscriptionError::DailyLimitReached);
                return false;
            }
            record.uses_today += 1;
            record.last_reset_at = start_of_day(now);
            record.updated_at = now;
            outcome = Ok(record.daily_limit.saturating_sub(record.uses_today));
            true
        })?;

        if stored.is_none() {
            return Err(SubscriptionError::NotPro);
        }
        outcome
    }

    /// Payment-capture upsert: a fresh Pro window starting now, with
    /// today's counter zeroed.
    ///
    /// Repeated activation re-extends the window from the new `now`
    /// rather than stacking durations; a duplicated capture signal is
    /// therefore harmless.
    pub fn activate(&self, user_id: Uuid) -> Result<SubscriptionRecord, SubscriptionError> {
        let now = self.clock.now();
        let record = SubscriptionRecord {
            user_id,
            status: SubscriptionStatus::Pro,
            period_start: now,
            period_end: now + Duration::days(self.limits.pro_period_days),
            daily_limit: self.limits.pro_daily_limit,
            uses_today: 0,
            last_reset_at: start_of_day(now),
            updated_at: now,
        };
        self.store.upsert(record.clone())?;
        tracing::info!(%user_id, period_end = %record.period_end, "pro subscription activated");
        Ok(record)
    }
}
