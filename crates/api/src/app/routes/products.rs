use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use stockroom_catalog::{Category, NewProduct, Product, ProductPatch, ProductSearch};
use stockroom_core::{CategoryId, DomainError, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/search", get(search_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/stock", get(get_stock))
        .route("/:id/force", delete(force_delete_product))
}

async fn ensure_category(
    services: &AppServices,
    category_id: Option<CategoryId>,
) -> Result<(), axum::response::Response> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    match services.catalog.category_exists(category_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(errors::domain_error_to_response(DomainError::not_found(
            "category",
            category_id,
        ))),
        Err(e) => Err(errors::domain_error_to_response(e)),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewProduct>,
) -> axum::response::Response {
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }
    if let Err(resp) = ensure_category(&services, body.category_id).await {
        return resp;
    }

    let product = body.into_product(ProductId::new());
    if let Err(e) = services.catalog.insert_product(&product).await {
        return errors::domain_error_to_response(e);
    }

    let category = match category_of(&services, &product).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    (
        StatusCode::CREATED,
        Json(dto::product_to_json(
            &product,
            category.as_ref(),
            rust_decimal::Decimal::ZERO,
        )),
    )
        .into_response()
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let products = match services.catalog.products().await {
        Ok(products) => products,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let categories = match category_index(&services).await {
        Ok(index) => index,
        Err(resp) => return resp,
    };

    let mut items = Vec::with_capacity(products.len());
    for product in &products {
        let stock = match services.ledger.stock_of(product.id).await {
            Ok(stock) => stock,
            Err(e) => return errors::domain_error_to_response(e),
        };
        let category = product.category_id.and_then(|id| categories.get(&id));
        items.push(dto::product_to_json(product, category, stock));
    }

    Json(items).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let product = match services.catalog.product(product_id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return errors::domain_error_to_response(DomainError::not_found("product", product_id));
        }
        Err(e) => return errors::domain_error_to_response(e),
    };

    let stock = match services.ledger.stock_of(product_id).await {
        Ok(stock) => stock,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let category = match category_of(&services, &product).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    Json(dto::product_to_json(&product, category.as_ref(), stock)).into_response()
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.product(product_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::domain_error_to_response(DomainError::not_found("product", product_id));
        }
        Err(e) => return errors::domain_error_to_response(e),
    }

    let stock = match services.ledger.stock_of(product_id).await {
        Ok(stock) => stock,
        Err(e) => return errors::domain_error_to_response(e),
    };

    Json(serde_json::json!({
        "product_id": product_id,
        "stock": stock,
    }))
    .into_response()
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<ProductSearch>,
) -> axum::response::Response {
    let page = match params.normalize() {
        Ok(page) => page,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let (total, products) = match services.catalog.search_products(&page).await {
        Ok(result) => result,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let categories = match category_index(&services).await {
        Ok(index) => index,
        Err(resp) => return resp,
    };

    let mut items = Vec::with_capacity(products.len());
    for product in &products {
        let stock = match services.ledger.stock_of(product.id).await {
            Ok(stock) => stock,
            Err(e) => return errors::domain_error_to_response(e),
        };
        let category = product.category_id.and_then(|id| categories.get(&id));
        items.push(dto::product_to_json(product, category, stock));
    }

    Json(serde_json::json!({
        "total": total,
        "page": page.page,
        "page_size": page.page_size,
        "items": items,
    }))
    .into_response()
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ProductPatch>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    match services.catalog.product(product_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::domain_error_to_response(DomainError::not_found("product", product_id));
        }
        Err(e) => return errors::domain_error_to_response(e),
    }
    if let Err(resp) = ensure_category(&services, body.category_id).await {
        return resp;
    }

    let product = body.into_product(product_id);
    if let Err(e) = services.catalog.update_product(&product).await {
        return errors::domain_error_to_response(e);
    }

    let stock = match services.ledger.stock_of(product_id).await {
        Ok(stock) => stock,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let category = match category_of(&services, &product).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    Json(dto::product_to_json(&product, category.as_ref(), stock)).into_response()
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.delete_product(product_id, false).await {
        Ok(report) => Json(serde_json::json!({
            "product_id": report.product_id,
            "movements_deleted": report.movements_deleted,
            "forced": report.forced,
        }))
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Admin only: remove the product together with its whole movement log.
pub async fn force_delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if !principal.is_admin() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "only administrators may force-delete products",
        );
    }

    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.delete_product(product_id, true).await {
        Ok(report) => Json(serde_json::json!({
            "product_id": report.product_id,
            "movements_deleted": report.movements_deleted,
            "forced": report.forced,
        }))
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn category_of(
    services: &AppServices,
    product: &Product,
) -> Result<Option<Category>, axum::response::Response> {
    let Some(category_id) = product.category_id else {
        return Ok(None);
    };
    services
        .catalog
        .category(category_id)
        .await
        .map_err(errors::domain_error_to_response)
}

async fn category_index(
    services: &AppServices,
) -> Result<HashMap<CategoryId, Category>, axum::response::Response> {
    let categories = services
        .catalog
        .categories()
        .await
        .map_err(errors::domain_error_to_response)?;
    Ok(categories.into_iter().map(|c| (c.id, c)).collect())
}
