//! User Entity
//!
//! The slice of the account that authentication needs. Profile data
//! (bio, avatar, counters) belongs to the user domain service.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_password::UserPassword,
    user_role::UserRole,
};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub user_name: UserName,
    pub email: Email,
    pub display_name: String,
    pub password: UserPassword,
    pub user_role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    /// Access tokens issued before this instant are rejected
    pub password_changed_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New, unverified account. `password_changed_at` stays unset until
    /// the first real change.
    pub fn new(
        user_name: UserName,
        email: Email,
        display_name: String,
        password: UserPassword,
    ) -> Self {
        let now = Utc::now();

        Self {
            user_id: UserId::new(),
            user_name,
            email,
            display_name,
            password,
            user_role: UserRole::default(),
            is_verified: false,
            is_active: true,
            password_changed_at: None,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Timestamp recorded on password change
    ///
    /// Backdated by one second because token `iat` has second precision:
    /// a token minted in the same second as the change must stay valid.
    pub fn password_changed_stamp(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(1)
    }

    /// Whether an access token issued at `issued_at` (unix seconds) predates
    /// the last password change
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at < changed.timestamp())
    }
}
