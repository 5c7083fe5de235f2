//! Plan policy value object.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::MediaType;

/// What an account's plan allows it to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPolicy {
    pub allowed_types: HashSet<MediaType>,
    pub daily_limit_secs: u64,
}

impl PlanPolicy {
    pub fn new(allowed_types: impl IntoIterator<Item = MediaType>, daily_limit_secs: u64) -> Self {
        Self {
            allowed_types: allowed_types.into_iter().collect(),
            daily_limit_secs,
        }
    }

    /// Build a policy from the stored representation: a comma-separated
    /// list of media types and a limit in hours.
    ///
    /// Unknown entries in the list are ignored.
    pub fn from_stored(allowed_types: &str, daily_limit_hours: f64) -> Self {
        let allowed_types = allowed_types
            .split(',')
            .filter_map(MediaType::parse)
            .collect();
        let daily_limit_secs = (daily_limit_hours.max(0.0) * 3600.0).round() as u64;

        Self {
            allowed_types,
            daily_limit_secs,
        }
    }

    pub fn allows(&self, media_type: MediaType) -> bool {
        self.allowed_types.contains(&media_type)
    }

    /// Seconds left before `usage_secs` reaches the daily limit.
    pub fn remaining_secs(&self, usage_secs: u64) -> u64 {
        self.daily_limit_secs.saturating_sub(usage_secs)
    }

    pub fn is_exhausted(&self, usage_secs: u64) -> bool {
        usage_secs >= self.daily_limit_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stored() {
        let policy = PlanPolicy::from_stored("audio, video,bogus", 1.5);
        assert!(policy.allows(MediaType::Audio));
        assert!(policy.allows(MediaType::Video));
        assert!(!policy.allows(MediaType::Image));
        assert_eq!(policy.daily_limit_secs, 5400);
    }

    #[test]
    fn test_remaining_and_exhausted() {
        let policy = PlanPolicy::new([MediaType::Audio], 100);
        assert_eq!(policy.remaining_secs(40), 60);
        assert_eq!(policy.remaining_secs(140), 0);
        assert!(!policy.is_exhausted(99));
        assert!(policy.is_exhausted(100));
    }
}
