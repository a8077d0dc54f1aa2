//! User account lifecycle: creation, login verification, password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{DomainError, DomainResult, UserId};

use crate::password::{hash_password, validate_password_policy, verify_password};
use crate::Role;

/// How long a password-reset token stays redeemable.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// A pending password-reset grant. Only the hash of the token is kept; the
/// plaintext goes to the account holder once and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique contact address; the password-reset flow keys on it.
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub reset_token: Option<ResetToken>,
}

/// Command: create a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<Role>,
}

impl NewUser {
    pub fn validate(&self) -> DomainResult<()> {
        if self.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        validate_password_policy(&self.password)
    }
}

impl UserAccount {
    /// Validate the command and materialize an account with a hashed
    /// password. Uniqueness of username/email is the store's job.
    pub fn create(cmd: NewUser) -> DomainResult<Self> {
        cmd.validate()?;
        let password_hash = hash_password(&cmd.password)?;
        Ok(Self {
            id: UserId::new(),
            username: cmd.username.trim().to_string(),
            email: cmd.email.trim().to_string(),
            password_hash,
            roles: cmd.roles,
            reset_token: None,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Constant-shape login check; false for a wrong password.
    pub fn verify_password(&self, plain: &str) -> bool {
        verify_password(plain, &self.password_hash)
    }

    /// Issue a fresh reset token, replacing any pending one. Returns the
    /// plaintext token; only its hash is retained on the account.
    pub fn issue_reset_token(&mut self, now: DateTime<Utc>) -> DomainResult<String> {
        let plaintext = Uuid::new_v4().simple().to_string();
        let token_hash = hash_password(&plaintext)?;
        self.reset_token = Some(ResetToken {
            token_hash,
            expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
        });
        Ok(plaintext)
    }

    /// Redeem a reset token: the token must match the pending grant and be
    /// unexpired, and the new password must satisfy the policy. A redeemed
    /// token is consumed either way once it matches.
    pub fn reset_password(
        &mut self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let pending = self
            .reset_token
            .as_ref()
            .ok_or(DomainError::Unauthorized)?;
        if !verify_password(token, &pending.token_hash) {
            return Err(DomainError::Unauthorized);
        }
        if now >= pending.expires_at {
            self.reset_token = None;
            return Err(DomainError::Unauthorized);
        }

        validate_password_policy(new_password)?;
        self.password_hash = hash_password(new_password)?;
        self.reset_token = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "Admin1234!".to_string(),
            roles: vec![Role::Admin],
        }
    }

    #[test]
    fn create_hashes_password() {
        let account = UserAccount::create(new_user()).unwrap();
        assert_ne!(account.password_hash, "Admin1234!");
        assert!(account.verify_password("Admin1234!"));
        assert!(!account.verify_password("wrong"));
    }

    #[test]
    fn create_enforces_password_policy() {
        let mut cmd = new_user();
        cmd.password = "weak".to_string();
        assert!(UserAccount::create(cmd).is_err());
    }

    #[test]
    fn reset_flow_roundtrip() {
        let mut account = UserAccount::create(new_user()).unwrap();
        let now = Utc::now();

        let token = account.issue_reset_token(now).unwrap();
        account
            .reset_password(&token, "Fresh1234!", now)
            .unwrap();

        assert!(account.verify_password("Fresh1234!"));
        assert!(account.reset_token.is_none());
    }

    #[test]
    fn reset_rejects_wrong_token() {
        let mut account = UserAccount::create(new_user()).unwrap();
        let now = Utc::now();
        account.issue_reset_token(now).unwrap();

        let err = account
            .reset_password("bogus", "Fresh1234!", now)
            .unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
        assert!(account.verify_password("Admin1234!"));
    }

    #[test]
    fn reset_rejects_expired_token() {
        let mut account = UserAccount::create(new_user()).unwrap();
        let issued = Utc::now();
        let token = account.issue_reset_token(issued).unwrap();

        let later = issued + Duration::hours(RESET_TOKEN_TTL_HOURS + 1);
        let err = account
            .reset_password(&token, "Fresh1234!", later)
            .unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
    }
}
