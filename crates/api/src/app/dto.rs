//! Request/response DTOs and JSON mapping helpers.
//!
//! Create/update request bodies deserialize straight into the domain
//! commands (`NewProduct`, `NewMovement`, ...); this module holds the bodies
//! that have no domain counterpart plus the response mapping.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use stockroom_auth::UserAccount;
use stockroom_catalog::{Category, Product, Warehouse};
use stockroom_ledger::Movement;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementListQuery {
    pub product_id: String,
}

/// Product annotated with its derived stock and category name.
pub fn product_to_json(
    product: &Product,
    category: Option<&Category>,
    stock: Decimal,
) -> serde_json::Value {
    json!({
        "id": product.id,
        "sku": product.sku,
        "name": product.name,
        "description": product.description,
        "purchase_price": product.purchase_price,
        "unit_price": product.unit_price,
        "category_id": product.category_id,
        "category": category.map(|c| c.name.clone()),
        "stock": stock,
    })
}

pub fn movement_to_json(movement: &Movement) -> serde_json::Value {
    json!({
        "id": movement.id,
        "product_id": movement.product_id,
        "warehouse_id": movement.warehouse_id,
        "kind": movement.kind,
        "quantity": movement.quantity,
        "moved_at": movement.moved_at,
        "reference": movement.reference,
    })
}

pub fn category_to_json(category: &Category) -> serde_json::Value {
    json!({
        "id": category.id,
        "name": category.name,
    })
}

pub fn warehouse_to_json(warehouse: &Warehouse) -> serde_json::Value {
    json!({
        "id": warehouse.id,
        "name": warehouse.name,
        "location": warehouse.location,
    })
}

/// Never exposes the password hash or any pending reset token.
pub fn user_to_json(user: &UserAccount) -> serde_json::Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "roles": user.roles,
    })
}
