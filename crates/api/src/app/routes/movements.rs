use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{DomainError, ProductId};
use stockroom_ledger::NewMovement;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_movement).get(list_movements))
}

/// Append a movement. The ledger serializes writes per product, so an
/// outbound entry that would drive stock negative is rejected here with a
/// 422 regardless of concurrent requests.
pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewMovement>,
) -> axum::response::Response {
    match services.ledger.record(body).await {
        Ok(movement) => {
            (StatusCode::CREATED, Json(dto::movement_to_json(&movement))).into_response()
        }
        // The only validation the ledger applies here is quantity positivity.
        Err(DomainError::Validation(msg)) => {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_quantity", msg)
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::MovementListQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match params.product_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.movements_for(product_id).await {
        Ok(movements) => {
            let items: Vec<_> = movements.iter().map(dto::movement_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
