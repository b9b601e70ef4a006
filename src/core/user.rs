//! User entity and repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserStatus {
    PendingVerification,
    Active,
    Suspended,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Only active, verified users may authenticate (spec.md §3 invariant).
    pub fn can_authenticate(&self) -> bool {
        self.status == UserStatus::Active && self.email_verified_at.is_some()
    }
}

pub fn canonicalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError>;
    async fn find_by_email(&self, email_lower: &str) -> Result<Option<User>, CoreError>;
    async fn update_password_hash(&self, user_id: &str, new_hash: &str, now: DateTime<Utc>) -> Result<(), CoreError>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryUserRepository {
        pub users: Mutex<Vec<User>>,
    }

    impl InMemoryUserRepository {
        pub fn seed(&self, user: User) {
            self.users.lock().unwrap().push(user);
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_email(&self, email_lower: &str) -> Result<Option<User>, CoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email_lower)
                .cloned())
        }

        async fn update_password_hash(&self, user_id: &str, new_hash: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| CoreError::not_found("user not found"))?;
            user.password_hash = new_hash.to_string();
            user.updated_at = now;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(status: UserStatus, verified: bool) -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
            status,
            email_verified_at: verified.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_active_and_verified_can_authenticate() {
        assert!(user(UserStatus::Active, true).can_authenticate());
        assert!(!user(UserStatus::Active, false).can_authenticate());
        assert!(!user(UserStatus::Suspended, true).can_authenticate());
        assert!(!user(UserStatus::PendingVerification, true).can_authenticate());
    }

    #[test]
    fn email_canonicalisation_lowercases_and_trims() {
        assert_eq!(canonicalize_email("  ALICE@X.com "), "alice@x.com");
    }
}
