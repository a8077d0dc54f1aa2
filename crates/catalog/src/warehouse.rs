use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, WarehouseId};

/// Reference entity: never deleted once referenced by a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: Option<String>,
}

/// Command: create a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub location: Option<String>,
}

impl NewWarehouse {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(())
    }

    pub fn into_warehouse(self, id: WarehouseId) -> Warehouse {
        Warehouse {
            id,
            name: self.name.trim().to_string(),
            location: self.location,
        }
    }
}
