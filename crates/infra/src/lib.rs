//! Infrastructure layer: storage backends and startup seeding.
//!
//! Two backends implement the same store traits (and the ledger's
//! [`stockroom_ledger::LedgerBackend`] port): an in-memory store for dev and
//! tests, and a Postgres store over sqlx for real deployments.

pub mod seed;
pub mod store;

pub use store::memory::MemoryStore;
pub use store::postgres::PgStore;
pub use store::{CatalogStore, UserStore};
