//! Owner directory — last-activity tracking per advertiser, consumed by the
//! health scorer's recency component and the churn-risk insight rule.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub owner: String,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct OwnerDirectory {
    owners: DashMap<String, OwnerProfile>,
}

impl OwnerDirectory {
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
        }
    }

    /// Record activity for an owner (login, dashboard action, API call),
    /// creating the profile on first touch.
    pub fn touch(&self, owner: &str, at: DateTime<Utc>) {
        self.owners
            .entry(owner.to_string())
            .and_modify(|profile| {
                if at > profile.last_active_at {
                    profile.last_active_at = at;
                }
            })
            .or_insert_with(|| OwnerProfile {
                owner: owner.to_string(),
                last_active_at: at,
                created_at: at,
            });
    }

    pub fn get(&self, owner: &str) -> Option<OwnerProfile> {
        self.owners.get(owner).map(|p| p.clone())
    }

    /// Whole days since the owner's most recent activity. Unknown owners
    /// are treated as maximally stale.
    pub fn days_inactive(&self, owner: &str, now: DateTime<Utc>) -> i64 {
        match self.owners.get(owner) {
            Some(profile) => (now - profile.last_active_at).num_days().max(0),
            None => i64::MAX,
        }
    }

    pub fn list(&self) -> Vec<OwnerProfile> {
        let mut all: Vec<OwnerProfile> = self.owners.iter().map(|p| p.clone()).collect();
        all.sort_by(|a, b| a.owner.cmp(&b.owner));
        all
    }
}

impl Default for OwnerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_touch_keeps_most_recent() {
        let directory = OwnerDirectory::new();
        let now = Utc::now();

        directory.touch("adv-1", now - Duration::days(3));
        directory.touch("adv-1", now - Duration::days(10));

        assert_eq!(directory.days_inactive("adv-1", now), 3);
    }

    #[test]
    fn test_unknown_owner_is_stale() {
        let directory = OwnerDirectory::new();
        assert_eq!(directory.days_inactive("ghost", Utc::now()), i64::MAX);
    }
}
