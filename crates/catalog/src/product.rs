use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId};

/// Catalog entry. Stock is intentionally absent: it is derived from the
/// movement log on every read, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique across all products at all times. Human-assigned, editable.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub purchase_price: Decimal,
    pub unit_price: Decimal,
    pub category_id: Option<CategoryId>,
}

/// Command: create a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub purchase_price: Decimal,
    pub unit_price: Decimal,
    pub category_id: Option<CategoryId>,
}

/// Command: replace a product's attributes in place.
///
/// Same field set as [`NewProduct`]; the SKU-uniqueness check against other
/// products is the store's job.
pub type ProductPatch = NewProduct;

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.purchase_price < Decimal::ZERO {
            return Err(DomainError::validation("purchase_price cannot be negative"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        Ok(())
    }

    /// Materialize the entity with a server-assigned identity, trimming the
    /// human-entered keys.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            sku: self.sku.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            purchase_price: self.purchase_price,
            unit_price: self.unit_price,
            category_id: self.category_id,
        }
    }
}

/// Search parameters as they arrive from the query string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductSearch {
    pub q: String,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Normalized search window: blank queries rejected, page numbers clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub q: String,
    pub page: u32,
    pub page_size: u32,
}

impl ProductSearch {
    pub fn normalize(self) -> DomainResult<SearchPage> {
        let q = self.q.trim().to_string();
        if q.is_empty() {
            return Err(DomainError::validation("the 'q' parameter is required"));
        }
        Ok(SearchPage {
            q,
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size.unwrap_or(10).max(1),
        })
    }
}

impl SearchPage {
    /// Case-insensitive substring match on name or SKU.
    pub fn matches(&self, product: &Product) -> bool {
        let needle = self.q.to_lowercase();
        product.name.to_lowercase().contains(&needle)
            || product.sku.to_lowercase().contains(&needle)
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) as usize) * self.page_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_product(sku: &str, name: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            description: None,
            purchase_price: dec!(10),
            unit_price: dec!(15),
            category_id: None,
        }
    }

    #[test]
    fn validate_rejects_blank_sku() {
        let err = new_product("  ", "Widget").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn validate_rejects_negative_price() {
        let mut cmd = new_product("W-1", "Widget");
        cmd.unit_price = dec!(-1);
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn into_product_trims_keys() {
        let product = new_product(" W-1 ", " Widget ").into_product(ProductId::new());
        assert_eq!(product.sku, "W-1");
        assert_eq!(product.name, "Widget");
    }

    #[test]
    fn normalize_rejects_blank_query() {
        let search = ProductSearch {
            q: "   ".to_string(),
            page: None,
            page_size: None,
        };
        assert!(search.normalize().is_err());
    }

    #[test]
    fn normalize_clamps_page_numbers() {
        let page = ProductSearch {
            q: "widget".to_string(),
            page: Some(0),
            page_size: Some(0),
        }
        .normalize()
        .unwrap();
        assert_eq!((page.page, page.page_size), (1, 1));

        let defaults = ProductSearch {
            q: "widget".to_string(),
            page: None,
            page_size: None,
        }
        .normalize()
        .unwrap();
        assert_eq!((defaults.page, defaults.page_size), (1, 10));
    }

    #[test]
    fn search_matches_name_and_sku_case_insensitively() {
        let page = ProductSearch {
            q: "wid".to_string(),
            page: None,
            page_size: None,
        }
        .normalize()
        .unwrap();

        let by_name = new_product("A-1", "Steel WIDGET").into_product(ProductId::new());
        let by_sku = new_product("WID-9", "Bolt").into_product(ProductId::new());
        let neither = new_product("B-2", "Bracket").into_product(ProductId::new());

        assert!(page.matches(&by_name));
        assert!(page.matches(&by_sku));
        assert!(!page.matches(&neither));
    }
}
