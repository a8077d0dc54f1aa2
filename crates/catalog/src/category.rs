use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult};

/// Reference entity: never deleted once referenced by a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Command: create a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(())
    }

    pub fn into_category(self, id: CategoryId) -> Category {
        Category {
            id,
            name: self.name.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_name() {
        let cmd = NewCategory {
            name: " ".to_string(),
        };
        assert!(cmd.validate().is_err());
    }
}
