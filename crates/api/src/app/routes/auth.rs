use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};

use stockroom_auth::JwtClaims;
use stockroom_core::DomainError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const TOKEN_TTL_HOURS: i64 = 8;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let account = match services.users.user_by_username(&body.username).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid username or password",
            );
        }
        Err(e) => return errors::domain_error_to_response(e),
    };

    if !account.verify_password(&body.password) {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        );
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: account.id,
        username: account.username.clone(),
        roles: account.roles.clone(),
        issued_at: now,
        expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
    };

    let token = match services.jwt.sign(&claims) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("failed to sign token: {e}");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                "failed to issue token",
            );
        }
    };

    Json(serde_json::json!({
        "token": token,
        "username": account.username,
        "roles": account.roles,
    }))
    .into_response()
}

/// Issue a password-reset token for the account behind an email address.
///
/// The token comes back in the response body; a deployment with an outbound
/// mail channel would deliver it there instead.
pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ForgotPasswordRequest>,
) -> axum::response::Response {
    let mut account = match services.users.user_by_email(&body.email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_email",
                "no account with that email",
            );
        }
        Err(e) => return errors::domain_error_to_response(e),
    };

    let token = match account.issue_reset_token(Utc::now()) {
        Ok(token) => token,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.users.update_user(&account).await {
        return errors::domain_error_to_response(e);
    }

    Json(serde_json::json!({ "token": token })).into_response()
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ResetPasswordRequest>,
) -> axum::response::Response {
    let mut account = match services.users.user_by_email(&body.email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "unknown_email",
                "no account with that email",
            );
        }
        Err(e) => return errors::domain_error_to_response(e),
    };

    match account.reset_password(&body.token, &body.new_password, Utc::now()) {
        Ok(()) => {}
        Err(DomainError::Unauthorized) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_token",
                "reset token is invalid or expired",
            );
        }
        Err(e) => return errors::domain_error_to_response(e),
    }

    if let Err(e) = services.users.update_user(&account).await {
        return errors::domain_error_to_response(e);
    }

    StatusCode::OK.into_response()
}
