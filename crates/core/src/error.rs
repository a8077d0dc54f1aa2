//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). The one infrastructure variant (`Storage`) exists
/// so storage backends can surface aborted transactions without the caller
/// depending on a concrete driver error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A conflict occurred (e.g. SKU already in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An outbound movement would drive the derived stock negative.
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: Decimal,
        requested: Decimal,
    },

    /// Product deletion blocked by existing ledger history.
    #[error("product {product_id} has inventory movements")]
    HasMovements { product_id: ProductId },

    /// Authentication/authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,

    /// Underlying persistence unavailable or a transaction aborted.
    /// The failed operation has no observable partial effect.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
