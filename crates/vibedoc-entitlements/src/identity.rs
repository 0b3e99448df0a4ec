//! Identity Resolution
//!
//! Classifies the current caller into exactly one entitlement tier.
//! Pure classification over already-fetched state; refreshing the Pro
//! standing is a separate operation on the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::ProStatus;

/// Entitlement tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// No session; quota is device-scoped
    Anonymous,
    /// Valid session without an active subscription; quota is
    /// (email, device)-scoped
    FreeAuthenticated,
    /// Active subscription; quota is server-account-scoped
    Pro,
}

/// Authenticated session state as seen by the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Durable server-assigned user id
    pub user_id: Uuid,
    /// Account email
    pub email: String,
}

/// Classify the caller.
///
/// Pro wins whenever the last successful status fetch reported an active
/// subscription; otherwise a session means free tier; otherwise anonymous.
pub fn resolve_tier(session: Option<&SessionInfo>, pro: Option<&ProStatus>) -> Tier {
    if pro.map(|p| p.is_pro).unwrap_or(false) {
        return Tier::Pro;
    }
    if session.is_some() {
        Tier::FreeAuthenticated
    } else {
        Tier::Anonymous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionInfo {
        SessionInfo {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
        }
    }

    fn active_pro() -> ProStatus {
        ProStatus {
            is_pro: true,
            remaining_today: 5,
            daily_limit: 5,
            period_end: None,
        }
    }

    #[test]
    fn test_no_session_is_anonymous() {
        assert_eq!(resolve_tier(None, None), Tier::Anonymous);
    }

    #[test]
    fn test_session_without_pro_is_free() {
        let s = session();
        assert_eq!(resolve_tier(Some(&s), None), Tier::FreeAuthenticated);
        assert_eq!(
            resolve_tier(Some(&s), Some(&ProStatus::inactive())),
            Tier::FreeAuthenticated
        );
    }

    #[test]
    fn test_pro_takes_precedence() {
        let s = session();
        assert_eq!(resolve_tier(Some(&s), Some(&active_pro())), Tier::Pro);
    }
}
