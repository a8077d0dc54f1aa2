use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_catalog::NewWarehouse;
use stockroom_core::{DomainError, WarehouseId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_warehouse).get(list_warehouses))
        .route("/:id", get(get_warehouse))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewWarehouse>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    let warehouse = body.into_warehouse(WarehouseId::new());
    if let Err(e) = services.catalog.insert_warehouse(&warehouse).await {
        return errors::domain_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::warehouse_to_json(&warehouse))).into_response()
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.warehouses().await {
        Ok(warehouses) => {
            let items: Vec<_> = warehouses.iter().map(dto::warehouse_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.warehouse(warehouse_id).await {
        Ok(Some(warehouse)) => Json(dto::warehouse_to_json(&warehouse)).into_response(),
        Ok(None) => {
            errors::domain_error_to_response(DomainError::not_found("warehouse", warehouse_id))
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
