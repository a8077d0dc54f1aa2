//! Password hashing (argon2id) and the account password policy.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use stockroom_core::{DomainError, DomainResult};

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| DomainError::storage(format!("password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored PHC-format hash.
///
/// An unparseable stored hash verifies as false rather than erroring; the
/// caller cannot do anything useful with the distinction.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Account password policy: at least 10 characters with a digit, a lowercase
/// letter, an uppercase letter, and a non-alphanumeric character.
pub fn validate_password_policy(plain: &str) -> DomainResult<()> {
    if plain.chars().count() < 10 {
        return Err(DomainError::validation(
            "password must be at least 10 characters",
        ));
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation("password must contain a digit"));
    }
    if !plain.chars().any(|c| c.is_lowercase()) {
        return Err(DomainError::validation(
            "password must contain a lowercase letter",
        ));
    }
    if !plain.chars().any(|c| c.is_uppercase()) {
        return Err(DomainError::validation(
            "password must contain an uppercase letter",
        ));
    }
    if plain.chars().all(|c| c.is_alphanumeric()) {
        return Err(DomainError::validation(
            "password must contain a non-alphanumeric character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("Admin1234!").unwrap();
        assert!(verify_password("Admin1234!", &hash));
        assert!(!verify_password("Admin1234?", &hash));
    }

    #[test]
    fn verify_tolerates_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn policy_accepts_compliant_password() {
        assert!(validate_password_policy("Admin1234!").is_ok());
    }

    #[test]
    fn policy_rejects_weak_passwords() {
        for weak in ["short1A!", "admin1234!", "ADMIN1234!", "Adminxxxx!", "Admin12345"] {
            assert!(validate_password_policy(weak).is_err(), "{weak}");
        }
    }
}
