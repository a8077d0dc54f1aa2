use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stockroom_auth::{NewUser, UserAccount};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(create_user).get(list_users))
}

fn require_admin(principal: &PrincipalContext) -> Result<(), axum::response::Response> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "administrator role required",
        ))
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewUser>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&principal) {
        return resp;
    }

    let account = match UserAccount::create(body) {
        Ok(account) => account,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.users.insert_user(&account).await {
        return errors::domain_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::user_to_json(&account))).into_response()
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(&principal) {
        return resp;
    }

    match services.users.users().await {
        Ok(accounts) => {
            let items: Vec<_> = accounts.iter().map(dto::user_to_json).collect();
            Json(items).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
