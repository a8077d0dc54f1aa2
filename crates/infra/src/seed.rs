//! Idempotent startup seeding.
//!
//! Check-then-create, guarded by the store's uniqueness rules, so repeated
//! startups are no-ops.

use stockroom_auth::{NewUser, Role, UserAccount};
use stockroom_core::{DomainError, DomainResult};

use crate::store::UserStore;

/// Bootstrap parameters for the default administrator account.
#[derive(Debug, Clone)]
pub struct DefaultAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for DefaultAdmin {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@stockroom.local".to_string(),
            password: "Admin1234!".to_string(),
        }
    }
}

/// Ensure the default admin account exists. Returns `true` when the account
/// was created on this call, `false` when it was already present.
pub async fn ensure_default_admin(
    users: &dyn UserStore,
    admin: &DefaultAdmin,
) -> DomainResult<bool> {
    if users.user_by_username(&admin.username).await?.is_some() {
        tracing::debug!(username = %admin.username, "default admin already present");
        return Ok(false);
    }

    let account = UserAccount::create(NewUser {
        username: admin.username.clone(),
        email: admin.email.clone(),
        password: admin.password.clone(),
        roles: vec![Role::Admin],
    })?;

    match users.insert_user(&account).await {
        Ok(()) => {
            tracing::info!(username = %admin.username, "created default admin account");
            Ok(true)
        }
        // A concurrent startup may have won the race; that is still a no-op.
        Err(DomainError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryStore::new();
        let admin = DefaultAdmin::default();

        assert!(ensure_default_admin(&store, &admin).await.unwrap());
        assert!(!ensure_default_admin(&store, &admin).await.unwrap());

        let account = store.user_by_username("admin").await.unwrap().unwrap();
        assert!(account.is_admin());
        assert!(account.verify_password("Admin1234!"));
    }
}
