//! Derived-stock arithmetic.
//!
//! Pure functions only; the authoritative movement log is the single source
//! of truth and these folds are recomputed on every read.

use rust_decimal::Decimal;

use crate::movement::{Movement, MovementKind};

/// Signed contribution of a single (kind, quantity) pair.
pub fn signed_quantity(kind: MovementKind, quantity: Decimal) -> Decimal {
    kind.sign() * quantity
}

/// Derived stock of a product: the signed sum of its movement log.
///
/// Deterministic for a given movement set; zero for an empty log.
pub fn stock_level<'a, I>(movements: I) -> Decimal
where
    I: IntoIterator<Item = &'a Movement>,
{
    movements
        .into_iter()
        .fold(Decimal::ZERO, |acc, m| acc + m.signed_quantity())
}
