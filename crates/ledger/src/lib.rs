//! Stock ledger domain module.
//!
//! Stock is never stored: it is the signed sum of a product's movement log,
//! recomputed on every read. This crate owns that log's business rules — the
//! non-negative-stock invariant at write time, and the all-or-nothing purge
//! path tied to product deletion. Storage lives behind [`LedgerBackend`].

pub mod movement;
pub mod service;
pub mod stock;
pub mod store;

pub use movement::{Movement, MovementKind, NewMovement};
pub use service::{PurgeReport, StockLedger};
pub use stock::{signed_quantity, stock_level};
pub use store::LedgerBackend;
