//! Entitlement Engine
//!
//! The single source of truth for "how many generations remain right now"
//! and "may I consume one now" across all three tiers, plus the
//! merge-on-login rule and the advisory Pro status cache.
//!
//! Anonymous and free-tier decisions are made against the device-local
//! counters. Pro decisions always go to the server-authoritative
//! subscription service; the cached status only classifies the caller and
//! feeds instant UI counts.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::EntitlementLimits;
use crate::device::CounterStore;
use crate::identity::{resolve_tier, SessionInfo, Tier};
use crate::subscription::{ProStatus, SubscriptionError, SubscriptionService};

/// Entitlement decision errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    /// The relevant counter is at its cap
    #[error("usage limit reached")]
    QuotaExceeded,
    /// Pro consume denied: subscription inactive or expired
    #[error("no active pro subscription")]
    NotPro,
    /// Pro consume denied: today's quota is exhausted
    #[error("daily limit reached")]
    DailyLimitReached,
    /// Infrastructure failure; never resolved as granted access
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SubscriptionError> for EntitlementError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NotPro => Self::NotPro,
            SubscriptionError::DailyLimitReached => Self::DailyLimitReached,
            SubscriptionError::Storage(msg) => Self::Storage(msg),
        }
    }
}

/// Entitlement engine for one device
pub struct EntitlementEngine {
    counters: CounterStore,
    subscriptions: Arc<SubscriptionService>,
    limits: EntitlementLimits,
    /// Last successfully fetched Pro standing; advisory only
    pro_cache: RwLock<Option<ProStatus>>,
}

impl EntitlementEngine {
    /// Create an engine over this device's counters and the shared
    /// subscription service
    pub fn new(
        counters: CounterStore,
        subscriptions: Arc<SubscriptionService>,
        limits: EntitlementLimits,
    ) -> Self {
        Self {
            counters,
            subscriptions,
            limits,
            pro_cache: RwLock::new(None),
        }
    }

    /// The device's counter store
    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    /// Last fetched Pro standing, if any fetch has succeeded
    pub fn cached_pro_status(&self) -> Option<ProStatus> {
        self.pro_cache.read().clone()
    }

    /// Refresh the cached Pro standing from the server-authoritative
    /// query. The query itself fails closed, so a failed refresh caches
    /// the inactive status.
    pub fn refresh_pro_status(&self, user_id: Uuid) -> ProStatus {
        let status = self.subscriptions.status(user_id);
        *self.pro_cache.write() = Some(status.clone());
        status
    }

    /// Login/session-restore hook.
    ///
    /// Merges the device's anonymous usage into the (email, device)
    /// counter before any allowance check can run for the session, then
    /// refreshes the Pro standing.
    pub fn on_login(&self, session: &SessionInfo) -> ProStatus {
        self.merge_anonymous_into_email(&session.email);
        self.refresh_pro_status(session.user_id)
    }

    /// Merge the device's anonymous usage into the (email, device)
    /// counter, capped at the free-tier limit.
    ///
    /// Only the portion of the anonymous counter this email has not
    /// already absorbed is applied, so repeating the merge with an
    /// unchanged anonymous counter is a no-op. The anonymous counter
    /// itself stays untouched; it is an irrevocable floor on free-tier
    /// usage for every email that logs in on this device.
    pub fn merge_anonymous_into_email(&self, email: &str) -> u32 {
        let anon = self.counters.anonymous_usage();
        let delta = anon.saturating_sub(self.counters.absorbed_anonymous(email));
        let current = self.counters.email_device_usage(email);
        let merged = (current + delta).min(self.limits.free_email_device_limit);
        self.counters.set_email_device_usage(email, merged);
        self.counters.set_absorbed_anonymous(email, anon);
        tracing::debug!(email, anon, current, merged, "merged anonymous usage");
        merged
    }

    /// Tier for the current caller, from session state and the cached
    /// Pro standing.
    ///
    /// Without a session the caller is anonymous no matter what the
    /// cache holds: the cached standing only classifies the session it
    /// was fetched for, and check and consume must agree on which
    /// counter applies.
    pub fn current_tier(&self, session: Option<&SessionInfo>) -> Tier {
        if session.is_none() {
            return Tier::Anonymous;
        }
        resolve_tier(session, self.pro_cache.read().as_ref())
    }

    /// Remaining allowance for the current caller.
    ///
    /// Pro with no successful status fetch reports 0: the engine fails
    /// closed until the server has been heard from.
    pub fn remaining_allowance(&self, session: Option<&SessionInfo>) -> u32 {
        match (self.current_tier(session), session) {
            (Tier::Pro, _) => self
                .pro_cache
                .read()
                .as_ref()
                .filter(|p| p.is_pro)
                .map(|p| p.remaining_today)
                .unwrap_or(0),
            (Tier::FreeAuthenticated, Some(s)) => self
                .limits
                .free_email_device_limit
                .saturating_sub(self.counters.email_device_usage(&s.email)),
            _ => self
                .limits
                .anon_total_limit
                .saturating_sub(self.counters.anonymous_usage()),
        }
    }

    /// Consume one unit for the current caller and return the remaining
    /// count.
    ///
    /// Local tiers re-check headroom here (allowance can change between
    /// check and use) and saturate at their caps. The Pro path defers to
    /// the server, which re-validates entitlement; divergence from the
    /// cached belief comes back as a normal denial.
    pub fn consume_one(
        &self,
        session: Option<&SessionInfo>,
    ) -> Result<u32, EntitlementError> {
        match (self.current_tier(session), session) {
            (Tier::Pro, Some(s)) => self.consume_pro(s.user_id),
            (Tier::FreeAuthenticated, Some(s)) => self.consume_free(&s.email),
            _ => self.consume_anonymous(),
        }
    }

    fn consume_anonymous(&self) -> Result<u32, EntitlementError> {
        if self.counters.anonymous_usage() >= self.limits.anon_total_limit {
            return Err(EntitlementError::QuotaExceeded);
        }
        let used = self.counters.record_anonymous_use();
        Ok(self.limits.anon_total_limit.saturating_sub(used))
    }

    fn consume_free(&self, email: &str) -> Result<u32, EntitlementError> {
        let used = self.counters.email_device_usage(email);
        if used >= self.limits.free_email_device_limit {
            return Err(EntitlementError::QuotaExceeded);
        }
        let next = (used + 1).min(self.limits.free_email_device_limit);
        self.counters.set_email_device_usage(email, next);
        Ok(self.limits.free_email_device_limit.saturating_sub(next))
    }

    fn consume_pro(&self, user_id: Uuid) -> Result<u32, EntitlementError> {
        match self.subscriptions.consume(user_id) {
            Ok(remaining) => {
                if let Some(cached) = self.pro_cache.write().as_mut() {
                    cached.remaining_today = remaining;
                }
                Ok(remaining)
            }
            Err(err) => {
                if err == SubscriptionError::NotPro {
                    // The subscription lapsed since the last fetch; drop
                    // the stale belief so the caller falls back a tier
                    *self.pro_cache.write() = None;
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::{DeviceStorage, MemoryStorage};
    use crate::subscription::MemorySubscriptionStore;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn harness() -> (EntitlementEngine, Arc<SubscriptionService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(MemorySubscriptionStore::new()),
            clock.clone(),
            EntitlementLimits::default(),
        ));
        let engine = EntitlementEngine::new(
            CounterStore::new(Arc::new(MemoryStorage::new()), EntitlementLimits::default()),
            subscriptions.clone(),
            EntitlementLimits::default(),
        );
        (engine, subscriptions, clock)
    }

    fn session(email: &str) -> SessionInfo {
        SessionInfo {
            user_id: Uuid::new_v4(),
            email: email.into(),
        }
    }

    #[test]
    fn test_anonymous_run_to_exhaustion() {
        let (engine, _, _) = harness();

        // Fresh device: three generations, then denial with 0 remaining
        assert_eq!(engine.remaining_allowance(None), 3);
        assert_eq!(engine.consume_one(None).unwrap(), 2);
        assert_eq!(engine.consume_one(None).unwrap(), 1);
        assert_eq!(engine.consume_one(None).unwrap(), 0);
        assert_eq!(engine.consume_one(None), Err(EntitlementError::QuotaExceeded));
        assert_eq!(engine.remaining_allowance(None), 0);
    }

    #[test]
    fn test_merge_seeds_email_counter() {
        let (engine, _, _) = harness();
        engine.consume_one(None).unwrap();
        engine.consume_one(None).unwrap();

        // Sign-up with two anonymous uses on the device
        let s = session("a@x.com");
        engine.on_login(&s);

        assert_eq!(engine.counters().email_device_usage("a@x.com"), 2);
        assert_eq!(engine.remaining_allowance(Some(&s)), 3);
    }

    #[test]
    fn test_merge_idempotent_with_unchanged_anonymous_counter() {
        let (engine, _, _) = harness();
        engine.consume_one(None).unwrap();

        let first = engine.merge_anonymous_into_email("a@x.com");
        let second = engine.merge_anonymous_into_email("a@x.com");

        assert_eq!(first, 1);
        assert_eq!(second, first);
    }

    #[test]
    fn test_session_restore_does_not_double_count() {
        let (engine, _, _) = harness();
        engine.consume_one(None).unwrap();
        let s = session("a@x.com");

        engine.on_login(&s);
        engine.consume_one(Some(&s)).unwrap();
        engine.on_login(&s);

        // The restore merged nothing new on top of the consumed counter
        assert_eq!(engine.counters().email_device_usage("a@x.com"), 2);
    }

    #[test]
    fn test_merge_absorbs_later_anonymous_usage_once() {
        let (engine, _, _) = harness();
        engine.consume_one(None).unwrap();
        engine.merge_anonymous_into_email("a@x.com");

        // Logged out, one more anonymous use, then back in
        engine.consume_one(None).unwrap();
        let merged = engine.merge_anonymous_into_email("a@x.com");

        assert_eq!(merged, 2);
    }

    #[test]
    fn test_free_tier_exhaustion() {
        let (engine, _, _) = harness();
        let s = session("a@x.com");
        engine.on_login(&s);

        for expected in (0..5).rev() {
            assert_eq!(engine.consume_one(Some(&s)).unwrap(), expected);
        }

        assert_eq!(
            engine.consume_one(Some(&s)),
            Err(EntitlementError::QuotaExceeded)
        );
    }

    #[test]
    fn test_pro_unfetched_fails_closed() {
        let (engine, subscriptions, _) = harness();
        let s = session("a@x.com");
        subscriptions.activate(s.user_id).unwrap();

        // No status fetch has succeeded yet; the caller classifies as
        // free tier and the cache reports nothing
        assert_eq!(engine.current_tier(Some(&s)), Tier::FreeAuthenticated);
        assert!(engine.cached_pro_status().is_none());
    }

    #[test]
    fn test_pro_consume_round_trip() {
        let (engine, subscriptions, _) = harness();
        let s = session("a@x.com");
        subscriptions.activate(s.user_id).unwrap();
        engine.on_login(&s);

        assert_eq!(engine.current_tier(Some(&s)), Tier::Pro);
        assert_eq!(engine.remaining_allowance(Some(&s)), 5);
        assert_eq!(engine.consume_one(Some(&s)).unwrap(), 4);
        assert_eq!(engine.remaining_allowance(Some(&s)), 4);
    }

    #[test]
    fn test_pro_expiry_between_fetch_and_consume() {
        let (engine, subscriptions, clock) = harness();
        let s = session("a@x.com");
        subscriptions.activate(s.user_id).unwrap();
        engine.on_login(&s);

        // Subscription expires after the page loaded its status
        clock.advance(Duration::days(31));

        assert_eq!(engine.consume_one(Some(&s)), Err(EntitlementError::NotPro));
        // The stale belief is dropped; the caller is free tier again
        assert_eq!(engine.current_tier(Some(&s)), Tier::FreeAuthenticated);
    }

    #[test]
    fn test_logged_out_caller_is_anonymous_despite_cached_pro() {
        let (engine, subscriptions, _) = harness();
        let s = session("a@x.com");
        subscriptions.activate(s.user_id).unwrap();
        engine.on_login(&s);

        // The cache still says pro, but no session is presented; the
        // allowance check and the consume both use the anonymous counter
        assert_eq!(engine.current_tier(None), Tier::Anonymous);
        assert_eq!(engine.remaining_allowance(None), 3);
        assert_eq!(engine.consume_one(None).unwrap(), 2);
        assert_eq!(engine.counters().anonymous_usage(), 1);
    }

    #[test]
    fn test_second_email_absorbs_same_anonymous_floor() {
        let (engine, _, _) = harness();
        engine.consume_one(None).unwrap();
        engine.consume_one(None).unwrap();

        engine.on_login(&session("a@x.com"));
        engine.on_login(&session("b@x.com"));

        // Observed product behavior: every email on the device starts
        // from the device's anonymous floor
        assert_eq!(engine.counters().email_device_usage("a@x.com"), 2);
        assert_eq!(engine.counters().email_device_usage("b@x.com"), 2);
    }

    #[test]
    fn test_unparsable_storage_is_not_fatal() {
        let (engine, _, _) = harness();
        let storage = Arc::new(MemoryStorage::new());
        storage.set("vibedoc_anon_usage", "garbage");
        let engine2 = EntitlementEngine::new(
            CounterStore::new(storage, EntitlementLimits::default()),
            engine.subscriptions.clone(),
            EntitlementLimits::default(),
        );

        assert_eq!(engine2.remaining_allowance(None), 3);
    }

    proptest! {
        #[test]
        fn prop_anonymous_counter_saturates(increments in 0usize..32) {
            let (engine, _, _) = harness();
            for _ in 0..increments {
                let _ = engine.consume_one(None);
            }
            let used = engine.counters().anonymous_usage();
            prop_assert!(used <= 3);
            prop_assert_eq!(used as usize, increments.min(3));
        }

        #[test]
        fn prop_merge_bounded_and_monotonic(anon in 0u32..10, prior in 0u32..6) {
            let (engine, _, _) = harness();
            for _ in 0..anon {
                let _ = engine.consume_one(None);
            }
            engine.counters().set_email_device_usage("a@x.com", prior);

            let merged = engine.merge_anonymous_into_email("a@x.com");

            prop_assert!(merged >= prior);
            prop_assert!(merged <= 5);
            prop_assert_eq!(merged, (prior + anon.min(3)).min(5));
        }
    }
}
