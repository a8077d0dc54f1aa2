use axum::Router;

pub mod auth;
pub mod categories;
pub mod movements;
pub mod products;
pub mod system;
pub mod users;
pub mod warehouses;

/// Routes behind the bearer-token middleware.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/warehouses", warehouses::router())
        .nest("/movements", movements::router())
        .nest("/users", users::router())
}
