//! Postgres backend over sqlx.
//!
//! Every query goes through the shared [`PgPool`]. Uniqueness (SKU,
//! username, email) is enforced by the schema's unique indexes and mapped to
//! `Conflict`; multi-step mutations run in transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stockroom_auth::{ResetToken, Role, UserAccount};
use stockroom_catalog::{Category, Product, SearchPage, Warehouse};
use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId, UserId, WarehouseId};
use stockroom_ledger::{LedgerBackend, Movement, MovementKind};

use super::{CatalogStore, UserStore};

/// Postgres error code for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store implementing every persistence port.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> DomainResult<Self> {
        let pool = PgPool::connect(database_url).await.map_err(storage_err)?;
        Ok(Self::new(pool))
    }

    /// Apply the idempotent schema. Safe to run at every startup.
    pub async fn ensure_schema(&self) -> DomainResult<()> {
        sqlx::raw_sql(include_str!("../../migrations/0001_schema.sql"))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn storage_err(e: sqlx::Error) -> DomainError {
    DomainError::storage(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// Advisory-lock key derived from the product id (first 8 bytes of the UUID).
fn product_lock_key(product_id: ProductId) -> i64 {
    let bytes = product_id.as_uuid().as_bytes();
    i64::from_le_bytes(bytes[..8].try_into().unwrap_or([0; 8]))
}

fn kind_as_str(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::In => "in",
        MovementKind::Out => "out",
    }
}

fn kind_from_str(s: &str) -> DomainResult<MovementKind> {
    match s {
        "in" => Ok(MovementKind::In),
        "out" => Ok(MovementKind::Out),
        other => Err(DomainError::storage(format!("unknown movement kind '{other}'"))),
    }
}

fn role_from_str(s: &str) -> DomainResult<Role> {
    match s {
        "Admin" => Ok(Role::Admin),
        "User" => Ok(Role::User),
        other => Err(DomainError::storage(format!("unknown role '{other}'"))),
    }
}

fn row_to_product(row: &PgRow) -> DomainResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage_err)?),
        sku: row.try_get("sku").map_err(storage_err)?,
        name: row.try_get("name").map_err(storage_err)?,
        description: row.try_get("description").map_err(storage_err)?,
        purchase_price: row.try_get("purchase_price").map_err(storage_err)?,
        unit_price: row.try_get("unit_price").map_err(storage_err)?,
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")
            .map_err(storage_err)?
            .map(CategoryId::from_uuid),
    })
}

fn row_to_movement(row: &PgRow) -> DomainResult<Movement> {
    let kind: String = row.try_get("kind").map_err(storage_err)?;
    Ok(Movement {
        id: row
            .try_get::<Uuid, _>("id")
            .map_err(storage_err)?
            .into(),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id").map_err(storage_err)?),
        warehouse_id: WarehouseId::from_uuid(
            row.try_get::<Uuid, _>("warehouse_id").map_err(storage_err)?,
        ),
        kind: kind_from_str(&kind)?,
        quantity: row.try_get("quantity").map_err(storage_err)?,
        moved_at: row.try_get::<DateTime<Utc>, _>("moved_at").map_err(storage_err)?,
        reference: row.try_get("reference").map_err(storage_err)?,
    })
}

fn row_to_user(row: &PgRow) -> DomainResult<UserAccount> {
    let roles: Vec<String> = row.try_get("roles").map_err(storage_err)?;
    let roles = roles
        .iter()
        .map(|r| role_from_str(r))
        .collect::<DomainResult<Vec<Role>>>()?;

    let token_hash: Option<String> = row.try_get("reset_token_hash").map_err(storage_err)?;
    let token_expiry: Option<DateTime<Utc>> = row
        .try_get("reset_token_expires_at")
        .map_err(storage_err)?;
    let reset_token = match (token_hash, token_expiry) {
        (Some(token_hash), Some(expires_at)) => Some(ResetToken {
            token_hash,
            expires_at,
        }),
        _ => None,
    };

    Ok(UserAccount {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage_err)?),
        username: row.try_get("username").map_err(storage_err)?,
        email: row.try_get("email").map_err(storage_err)?,
        password_hash: row.try_get("password_hash").map_err(storage_err)?,
        roles,
        reset_token,
    })
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, product: &Product) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, description, purchase_price, unit_price, category_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.purchase_price)
        .bind(product.unit_price)
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!(
                    "a product with SKU '{}' already exists",
                    product.sku
                ))
            } else {
                storage_err(e)
            }
        })?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE products SET sku = $2, name = $3, description = $4, \
             purchase_price = $5, unit_price = $6, category_id = $7 WHERE id = $1",
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.purchase_price)
        .bind(product.unit_price)
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!(
                    "another product already uses SKU '{}'",
                    product.sku
                ))
            } else {
                storage_err(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("product", product.id));
        }
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> DomainResult<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn products(&self) -> DomainResult<Vec<Product>> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(row_to_product).collect()
    }

    async fn search_products(&self, page: &SearchPage) -> DomainResult<(u64, Vec<Product>)> {
        let pattern = format!("%{}%", page.q);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE name ILIKE $1 OR sku ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        let rows = sqlx::query(
            "SELECT * FROM products WHERE name ILIKE $1 OR sku ILIKE $1 \
             ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(page.page_size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let items = rows.iter().map(row_to_product).collect::<DomainResult<_>>()?;
        Ok((total as u64, items))
    }

    async fn insert_category(&self, category: &Category) -> DomainResult<()> {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn category(&self, category_id: CategoryId) -> DomainResult<Option<Category>> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(category_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|row| Category {
            id: CategoryId::from_uuid(row.get("id")),
            name: row.get("name"),
        }))
    }

    async fn categories(&self) -> DomainResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: CategoryId::from_uuid(row.get("id")),
                name: row.get("name"),
            })
            .collect())
    }

    async fn category_exists(&self, category_id: CategoryId) -> DomainResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(category_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(exists)
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> DomainResult<()> {
        sqlx::query("INSERT INTO warehouses (id, name, location) VALUES ($1, $2, $3)")
            .bind(warehouse.id.as_uuid())
            .bind(&warehouse.name)
            .bind(&warehouse.location)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn warehouse(&self, warehouse_id: WarehouseId) -> DomainResult<Option<Warehouse>> {
        let row = sqlx::query("SELECT id, name, location FROM warehouses WHERE id = $1")
            .bind(warehouse_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|row| Warehouse {
            id: WarehouseId::from_uuid(row.get("id")),
            name: row.get("name"),
            location: row.get("location"),
        }))
    }

    async fn warehouses(&self) -> DomainResult<Vec<Warehouse>> {
        let rows = sqlx::query("SELECT id, name, location FROM warehouses ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows
            .into_iter()
            .map(|row| Warehouse {
                id: WarehouseId::from_uuid(row.get("id")),
                name: row.get("name"),
                location: row.get("location"),
            })
            .collect())
    }
}

#[async_trait]
impl LedgerBackend for PgStore {
    async fn product_exists(&self, product_id: ProductId) -> DomainResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(exists)
    }

    async fn warehouse_exists(&self, warehouse_id: WarehouseId) -> DomainResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM warehouses WHERE id = $1)")
            .bind(warehouse_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(exists)
    }

    async fn movement_sum(&self, product_id: ProductId) -> DomainResult<Decimal> {
        let sum: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(CASE WHEN kind = 'in' THEN quantity ELSE -quantity END), 0) \
             FROM movements WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(sum)
    }

    async fn has_movements(&self, product_id: ProductId) -> DomainResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM movements WHERE product_id = $1)")
                .bind(product_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(exists)
    }

    async fn movements_for(&self, product_id: ProductId) -> DomainResult<Vec<Movement>> {
        let rows = sqlx::query("SELECT * FROM movements WHERE product_id = $1 ORDER BY id")
            .bind(product_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(row_to_movement).collect()
    }

    /// Append inside a transaction holding the product's advisory lock, and
    /// re-verify the signed sum before committing. The in-process lock in
    /// the ledger service already serializes one process; this keeps the
    /// invariant when several processes share the database.
    async fn append(&self, movement: &Movement) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(product_lock_key(movement.product_id))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO movements (id, product_id, warehouse_id, kind, quantity, moved_at, reference) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.warehouse_id.as_uuid())
        .bind(kind_as_str(movement.kind))
        .bind(movement.quantity)
        .bind(movement.moved_at)
        .bind(&movement.reference)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let sum_after: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(CASE WHEN kind = 'in' THEN quantity ELSE -quantity END), 0) \
             FROM movements WHERE product_id = $1",
        )
        .bind(movement.product_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        if sum_after < Decimal::ZERO {
            tx.rollback().await.map_err(storage_err)?;
            return Err(DomainError::InsufficientStock {
                product_id: movement.product_id,
                available: sum_after - movement.signed_quantity(),
                requested: movement.quantity,
            });
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn delete_product(&self, product_id: ProductId) -> DomainResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn purge_product(&self, product_id: ProductId) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let deleted = sqlx::query("DELETE FROM movements WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?
            .rows_affected();

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(deleted)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &UserAccount) -> DomainResult<()> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, roles, reset_token_hash, reset_token_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.reset_token.as_ref().map(|t| t.token_hash.clone()))
        .bind(user.reset_token.as_ref().map(|t| t.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!(
                    "username or email already in use: {}",
                    user.username
                ))
            } else {
                storage_err(e)
            }
        })?;
        Ok(())
    }

    async fn update_user(&self, user: &UserAccount) -> DomainResult<()> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, roles = $5, \
             reset_token_hash = $6, reset_token_expires_at = $7 WHERE id = $1",
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.reset_token.as_ref().map(|t| t.token_hash.clone()))
        .bind(user.reset_token.as_ref().map(|t| t.expires_at))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> DomainResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_username(&self, username: &str) -> DomainResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_email(&self, email: &str) -> DomainResult<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn users(&self) -> DomainResult<Vec<UserAccount>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(row_to_user).collect()
    }
}
