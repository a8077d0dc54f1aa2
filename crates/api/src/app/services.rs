//! Infrastructure wiring: stores, ledger service, token signer, seed data.

use std::sync::Arc;

use stockroom_auth::Hs256Jwt;
use stockroom_infra::seed::{ensure_default_admin, DefaultAdmin};
use stockroom_infra::{CatalogStore, MemoryStore, PgStore, UserStore};
use stockroom_ledger::{LedgerBackend, StockLedger};

/// Everything the route handlers need, behind trait objects so the in-memory
/// and Postgres backends wire identically.
pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub ledger: StockLedger<dyn LedgerBackend>,
    pub jwt: Arc<Hs256Jwt>,
}

/// Wire services from the environment: `USE_PERSISTENT_STORES=true` selects
/// Postgres (`DATABASE_URL`), anything else the in-memory store.
pub async fn build_services(jwt_secret: String) -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services(jwt_secret).await
    } else {
        build_in_memory_services(jwt_secret).await
    }
}

/// In-memory wiring (dev/test).
pub async fn build_in_memory_services(jwt_secret: String) -> AppServices {
    let store = Arc::new(MemoryStore::new());
    let services = AppServices {
        catalog: store.clone(),
        users: store.clone(),
        ledger: StockLedger::new(store as Arc<dyn LedgerBackend>),
        jwt: Arc::new(Hs256Jwt::new(jwt_secret.as_bytes())),
    };
    seed(&services).await;
    services
}

async fn build_persistent_services(jwt_secret: String) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let store = PgStore::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");
    store
        .ensure_schema()
        .await
        .expect("failed to apply schema");

    let store = Arc::new(store);
    let services = AppServices {
        catalog: store.clone(),
        users: store.clone(),
        ledger: StockLedger::new(store as Arc<dyn LedgerBackend>),
        jwt: Arc::new(Hs256Jwt::new(jwt_secret.as_bytes())),
    };
    seed(&services).await;
    services
}

async fn seed(services: &AppServices) {
    let mut admin = DefaultAdmin::default();
    if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
        admin.password = password;
    }
    if let Err(e) = ensure_default_admin(services.users.as_ref(), &admin).await {
        tracing::error!("failed to seed default admin: {e}");
    }
}
