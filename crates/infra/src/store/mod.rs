//! Store traits shared by the in-memory and Postgres backends.

use async_trait::async_trait;

use stockroom_auth::UserAccount;
use stockroom_catalog::{Category, Product, SearchPage, Warehouse};
use stockroom_core::{CategoryId, DomainResult, ProductId, UserId, WarehouseId};

pub mod memory;
pub mod postgres;

/// Persistence for catalog entities.
///
/// Uniqueness rules live here: `insert_product`/`update_product` fail with
/// `Conflict` when the SKU is already held by another product, mirroring the
/// unique index the Postgres schema enforces.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> DomainResult<()>;

    /// Replace a product's attributes in place. `NotFound` when the id is
    /// unknown, `Conflict` when the new SKU belongs to another product.
    async fn update_product(&self, product: &Product) -> DomainResult<()>;

    async fn product(&self, product_id: ProductId) -> DomainResult<Option<Product>>;

    /// All products, ordered by name.
    async fn products(&self) -> DomainResult<Vec<Product>>;

    /// Matching products ordered by name, with the total match count before
    /// pagination.
    async fn search_products(&self, page: &SearchPage) -> DomainResult<(u64, Vec<Product>)>;

    async fn insert_category(&self, category: &Category) -> DomainResult<()>;

    async fn category(&self, category_id: CategoryId) -> DomainResult<Option<Category>>;

    async fn categories(&self) -> DomainResult<Vec<Category>>;

    async fn category_exists(&self, category_id: CategoryId) -> DomainResult<bool>;

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> DomainResult<()>;

    async fn warehouse(&self, warehouse_id: WarehouseId) -> DomainResult<Option<Warehouse>>;

    async fn warehouses(&self) -> DomainResult<Vec<Warehouse>>;
}

/// Persistence for user accounts. Username and email are both unique.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &UserAccount) -> DomainResult<()>;

    /// Persist password/reset-token changes for an existing account.
    async fn update_user(&self, user: &UserAccount) -> DomainResult<()>;

    async fn user(&self, user_id: UserId) -> DomainResult<Option<UserAccount>>;

    async fn user_by_username(&self, username: &str) -> DomainResult<Option<UserAccount>>;

    async fn user_by_email(&self, email: &str) -> DomainResult<Option<UserAccount>>;

    /// All accounts, ordered by username.
    async fn users(&self) -> DomainResult<Vec<UserAccount>>;
}
