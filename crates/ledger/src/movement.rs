use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, MovementId, ProductId, WarehouseId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    /// Sign applied to the quantity when deriving stock.
    pub fn sign(self) -> Decimal {
        match self {
            MovementKind::In => Decimal::ONE,
            MovementKind::Out => Decimal::NEGATIVE_ONE,
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MovementKind::In => f.write_str("in"),
            MovementKind::Out => f.write_str("out"),
        }
    }
}

/// One committed ledger entry. Append-only: never mutated or deleted except
/// via the product-scoped force-delete purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub moved_at: DateTime<Utc>,
    pub reference: Option<String>,
}

impl Movement {
    /// Contribution of this entry to the derived stock (`+quantity` for
    /// inbound, `-quantity` for outbound).
    pub fn signed_quantity(&self) -> Decimal {
        self.kind.sign() * self.quantity
    }
}

/// Command: record a movement against a product's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub quantity: Decimal,
    /// Defaults to the time of acceptance when absent.
    pub moved_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}

impl NewMovement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }

    pub fn signed_quantity(&self) -> Decimal {
        self.kind.sign() * self.quantity
    }

    /// Materialize the committed entry with a server-assigned identity.
    pub fn into_movement(self, accepted_at: DateTime<Utc>) -> Movement {
        Movement {
            id: MovementId::new(),
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            kind: self.kind,
            quantity: self.quantity,
            moved_at: self.moved_at.unwrap_or(accepted_at),
            reference: self.reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_movement(kind: MovementKind, quantity: Decimal) -> NewMovement {
        NewMovement {
            product_id: ProductId::new(),
            warehouse_id: WarehouseId::new(),
            kind,
            quantity,
            moved_at: None,
            reference: None,
        }
    }

    #[test]
    fn validate_rejects_zero_quantity() {
        let err = new_movement(MovementKind::In, Decimal::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn validate_rejects_negative_quantity() {
        let err = new_movement(MovementKind::Out, dec!(-3))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn signed_quantity_follows_direction() {
        assert_eq!(
            new_movement(MovementKind::In, dec!(4.5)).signed_quantity(),
            dec!(4.5)
        );
        assert_eq!(
            new_movement(MovementKind::Out, dec!(4.5)).signed_quantity(),
            dec!(-4.5)
        );
    }

    #[test]
    fn into_movement_defaults_timestamp_to_acceptance() {
        let accepted = Utc::now();
        let m = new_movement(MovementKind::In, dec!(1)).into_movement(accepted);
        assert_eq!(m.moved_at, accepted);
    }

    #[test]
    fn into_movement_keeps_caller_supplied_timestamp() {
        let supplied = Utc::now() - chrono::Duration::days(2);
        let mut cmd = new_movement(MovementKind::In, dec!(1));
        cmd.moved_at = Some(supplied);
        let m = cmd.into_movement(Utc::now());
        assert_eq!(m.moved_at, supplied);
    }
}
