use chrono::{DateTime, Utc};

/// A revoked refresh token, denied until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBlacklist {
    pub id: i64,
    pub token: String,
    pub blacklisted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenBlacklist {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
