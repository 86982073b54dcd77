use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub superseded: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle position of a reset token. Only `Live` is redeemable; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Live,
    Consumed,
    Expired,
    Superseded,
}

impl PasswordResetToken {
    /// A token is valid while `now < expires_at`; the expiry instant itself is expired.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.superseded {
            TokenState::Superseded
        } else if self.expired {
            TokenState::Expired
        } else if self.used {
            TokenState::Consumed
        } else if is_expired(self.expires_at, now) {
            TokenState::Expired
        } else {
            TokenState::Live
        }
    }
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn token(expires_at: DateTime<Utc>) -> PasswordResetToken {
        PasswordResetToken {
            id: 1,
            user_id: 1,
            email: "user@example.com".to_string(),
            token_hash: "abc".to_string(),
            expires_at,
            used: false,
            superseded: false,
            expired: false,
            created_at: expires_at - Duration::minutes(15),
        }
    }

    #[test]
    fn live_until_expiry_instant() {
        let expires = Utc::now();
        let t = token(expires);
        assert_eq!(t.state(expires - Duration::seconds(1)), TokenState::Live);
        assert_eq!(t.state(expires), TokenState::Expired);
        assert_eq!(t.state(expires + Duration::seconds(1)), TokenState::Expired);
    }

    #[test]
    fn consumed_wins_over_expiry() {
        let expires = Utc::now();
        let mut t = token(expires);
        t.used = true;
        assert_eq!(t.state(expires - Duration::minutes(1)), TokenState::Consumed);
        assert_eq!(t.state(expires + Duration::minutes(1)), TokenState::Consumed);
    }

    #[test]
    fn retired_after_expiry_stays_expired() {
        let expires = Utc::now();
        let mut t = token(expires);
        t.used = true;
        t.expired = true;
        assert_eq!(t.state(expires - Duration::minutes(1)), TokenState::Expired);
        assert_eq!(t.state(expires + Duration::minutes(1)), TokenState::Expired);
    }

    #[test]
    fn superseded_is_terminal() {
        let expires = Utc::now();
        let mut t = token(expires);
        t.used = true;
        t.superseded = true;
        assert_eq!(t.state(expires - Duration::minutes(1)), TokenState::Superseded);
    }
}
