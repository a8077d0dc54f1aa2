use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_catalog::NewCategory;
use stockroom_core::{CategoryId, DomainError};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_category).get(list_categories))
        .route("/:id", get(get_category))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCategory>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    let category = body.into_category(CategoryId::new());
    if let Err(e) = services.catalog.insert_category(&category).await {
        return errors::domain_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::category_to_json(&category))).into_response()
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.categories().await {
        Ok(categories) => {
            let items: Vec<_> = categories.iter().map(dto::category_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let category_id: CategoryId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.category(category_id).await {
        Ok(Some(category)) => Json(dto::category_to_json(&category)).into_response(),
        Ok(None) => {
            errors::domain_error_to_response(DomainError::not_found("category", category_id))
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
