//! In-memory backend (dev/test): the whole store behind one `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;

use stockroom_auth::UserAccount;
use stockroom_catalog::{Category, Product, SearchPage, Warehouse};
use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId, UserId, WarehouseId};
use stockroom_ledger::{stock_level, LedgerBackend, Movement};

use super::{CatalogStore, UserStore};

#[derive(Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    categories: HashMap<CategoryId, Category>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    movements: Vec<Movement>,
    users: HashMap<UserId, UserAccount>,
}

/// In-memory store implementing every persistence port.
///
/// Mutations take the write lock for their full critical section, so the
/// purge path (movements + product in one call) is atomic by construction.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> DomainResult<()> {
        let mut inner = self.write();
        if inner.products.values().any(|p| p.sku == product.sku) {
            return Err(DomainError::conflict(format!(
                "a product with SKU '{}' already exists",
                product.sku
            )));
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> DomainResult<()> {
        let mut inner = self.write();
        if !inner.products.contains_key(&product.id) {
            return Err(DomainError::not_found("product", product.id));
        }
        if inner
            .products
            .values()
            .any(|p| p.sku == product.sku && p.id != product.id)
        {
            return Err(DomainError::conflict(format!(
                "another product already uses SKU '{}'",
                product.sku
            )));
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> DomainResult<Option<Product>> {
        Ok(self.read().products.get(&product_id).cloned())
    }

    async fn products(&self) -> DomainResult<Vec<Product>> {
        let mut products: Vec<Product> = self.read().products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn search_products(&self, page: &SearchPage) -> DomainResult<(u64, Vec<Product>)> {
        let mut matching: Vec<Product> = self
            .read()
            .products
            .values()
            .filter(|p| page.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();
        Ok((total, items))
    }

    async fn insert_category(&self, category: &Category) -> DomainResult<()> {
        self.write()
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn category(&self, category_id: CategoryId) -> DomainResult<Option<Category>> {
        Ok(self.read().categories.get(&category_id).cloned())
    }

    async fn categories(&self) -> DomainResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.read().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn category_exists(&self, category_id: CategoryId) -> DomainResult<bool> {
        Ok(self.read().categories.contains_key(&category_id))
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> DomainResult<()> {
        self.write()
            .warehouses
            .insert(warehouse.id, warehouse.clone());
        Ok(())
    }

    async fn warehouse(&self, warehouse_id: WarehouseId) -> DomainResult<Option<Warehouse>> {
        Ok(self.read().warehouses.get(&warehouse_id).cloned())
    }

    async fn warehouses(&self) -> DomainResult<Vec<Warehouse>> {
        let mut warehouses: Vec<Warehouse> = self.read().warehouses.values().cloned().collect();
        warehouses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(warehouses)
    }
}

#[async_trait]
impl LedgerBackend for MemoryStore {
    async fn product_exists(&self, product_id: ProductId) -> DomainResult<bool> {
        Ok(self.read().products.contains_key(&product_id))
    }

    async fn warehouse_exists(&self, warehouse_id: WarehouseId) -> DomainResult<bool> {
        Ok(self.read().warehouses.contains_key(&warehouse_id))
    }

    async fn movement_sum(&self, product_id: ProductId) -> DomainResult<Decimal> {
        let inner = self.read();
        Ok(stock_level(
            inner.movements.iter().filter(|m| m.product_id == product_id),
        ))
    }

    async fn has_movements(&self, product_id: ProductId) -> DomainResult<bool> {
        Ok(self
            .read()
            .movements
            .iter()
            .any(|m| m.product_id == product_id))
    }

    async fn movements_for(&self, product_id: ProductId) -> DomainResult<Vec<Movement>> {
        Ok(self
            .read()
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn append(&self, movement: &Movement) -> DomainResult<()> {
        self.write().movements.push(movement.clone());
        Ok(())
    }

    async fn delete_product(&self, product_id: ProductId) -> DomainResult<()> {
        self.write().products.remove(&product_id);
        Ok(())
    }

    async fn purge_product(&self, product_id: ProductId) -> DomainResult<u64> {
        let mut inner = self.write();
        let before = inner.movements.len();
        inner.movements.retain(|m| m.product_id != product_id);
        let deleted = (before - inner.movements.len()) as u64;
        inner.products.remove(&product_id);
        Ok(deleted)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &UserAccount) -> DomainResult<()> {
        let mut inner = self.write();
        if inner
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(DomainError::conflict(format!(
                "username or email already in use: {}",
                user.username
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &UserAccount) -> DomainResult<()> {
        let mut inner = self.write();
        if !inner.users.contains_key(&user.id) {
            return Err(DomainError::not_found("user", user.id));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> DomainResult<Option<UserAccount>> {
        Ok(self.read().users.get(&user_id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> DomainResult<Option<UserAccount>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_by_email(&self, email: &str) -> DomainResult<Option<UserAccount>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn users(&self) -> DomainResult<Vec<UserAccount>> {
        let mut users: Vec<UserAccount> = self.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockroom_catalog::{NewProduct, ProductSearch};

    fn product(sku: &str, name: &str) -> Product {
        NewProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            description: None,
            purchase_price: dec!(1),
            unit_price: dec!(2),
            category_id: None,
        }
        .into_product(ProductId::new())
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert_product(&product("A-1", "Widget")).await.unwrap();

        let err = store
            .insert_product(&product("A-1", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_cannot_steal_another_products_sku() {
        let store = MemoryStore::new();
        store.insert_product(&product("A-1", "Widget")).await.unwrap();
        let mut second = product("B-2", "Bracket");
        store.insert_product(&second).await.unwrap();

        second.sku = "A-1".to_string();
        let err = store.update_product(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn listing_orders_by_name() {
        let store = MemoryStore::new();
        store.insert_product(&product("B", "Zcrew")).await.unwrap();
        store.insert_product(&product("A", "Anvil")).await.unwrap();

        let names: Vec<String> = store
            .products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Anvil", "Zcrew"]);
    }

    #[tokio::test]
    async fn search_paginates_over_total() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_product(&product(&format!("W-{i}"), &format!("Widget {i}")))
                .await
                .unwrap();
        }
        store.insert_product(&product("X-1", "Anvil")).await.unwrap();

        let page = ProductSearch {
            q: "widget".to_string(),
            page: Some(2),
            page_size: Some(2),
        }
        .normalize()
        .unwrap();

        let (total, items) = store.search_products(&page).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            items.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Widget 2", "Widget 3"]
        );
    }

    #[tokio::test]
    async fn purge_removes_product_and_movements_together() {
        use chrono::Utc;
        use stockroom_core::MovementId;
        use stockroom_ledger::MovementKind;

        let store = MemoryStore::new();
        let p = product("A-1", "Widget");
        store.insert_product(&p).await.unwrap();
        let warehouse_id = WarehouseId::new();

        for _ in 0..2 {
            store
                .append(&Movement {
                    id: MovementId::new(),
                    product_id: p.id,
                    warehouse_id,
                    kind: MovementKind::In,
                    quantity: dec!(1),
                    moved_at: Utc::now(),
                    reference: None,
                })
                .await
                .unwrap();
        }

        let deleted = store.purge_product(p.id).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!store.product_exists(p.id).await.unwrap());
        assert!(!store.has_movements(p.id).await.unwrap());
    }
}
