//! Entitlement Policy Configuration

use serde::{Deserialize, Serialize};

/// Policy limits governing each entitlement tier.
///
/// These are configuration, not constants: every engine and service takes
/// its limits at construction so tests and deployments can vary them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntitlementLimits {
    /// Lifetime generations per anonymous device
    pub anon_total_limit: u32,
    /// Lifetime generations per (email, device) pair
    pub free_email_device_limit: u32,
    /// Generations per calendar day on an active Pro subscription
    pub pro_daily_limit: u32,
    /// Length of a paid subscription window, in days
    pub pro_period_days: i64,
}

impl Default for EntitlementLimits {
    fn default() -> Self {
        Self {
            anon_total_limit: 3,
            free_email_device_limit: 5,
            pro_daily_limit: 5,
            pro_period_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = EntitlementLimits::default();

        assert_eq!(limits.anon_total_limit, 3);
        assert_eq!(limits.free_email_device_limit, 5);
        assert_eq!(limits.pro_daily_limit, 5);
        assert_eq!(limits.pro_period_days, 30);
    }
}
