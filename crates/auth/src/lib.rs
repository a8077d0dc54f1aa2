//! `stockroom-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: claims
//! validation, token signing, password hashing, and the account lifecycle
//! are all deterministic given their inputs.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod roles;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator};
pub use password::{hash_password, validate_password_policy, verify_password};
pub use roles::Role;
pub use user::{NewUser, ResetToken, UserAccount};
