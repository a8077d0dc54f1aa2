//! Storage port consumed by the ledger service.

use async_trait::async_trait;
use rust_decimal::Decimal;

use stockroom_core::{DomainResult, ProductId, WarehouseId};

use crate::movement::Movement;

/// Persistence operations the ledger needs.
///
/// Implementations must make `append` and `purge_product` atomic: a failed
/// call leaves no observable partial effect. The Postgres backend
/// additionally serializes the sum-check-append sequence per product with an
/// advisory transaction lock so the non-negative invariant holds across
/// processes; the in-process lock in [`crate::StockLedger`] covers a single
/// process on its own.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn product_exists(&self, product_id: ProductId) -> DomainResult<bool>;

    async fn warehouse_exists(&self, warehouse_id: WarehouseId) -> DomainResult<bool>;

    /// Signed sum over the committed movement log for one product.
    async fn movement_sum(&self, product_id: ProductId) -> DomainResult<Decimal>;

    /// Whether any committed movement references the product.
    async fn has_movements(&self, product_id: ProductId) -> DomainResult<bool>;

    /// Committed movements for one product, in insertion order.
    async fn movements_for(&self, product_id: ProductId) -> DomainResult<Vec<Movement>>;

    /// Append one committed entry to the log.
    async fn append(&self, movement: &Movement) -> DomainResult<()>;

    /// Remove the product row only. Callers must have verified the product
    /// has no movements.
    async fn delete_product(&self, product_id: ProductId) -> DomainResult<()>;

    /// Remove every movement referencing the product, then the product
    /// itself, as one atomic unit. Returns the number of movements removed.
    async fn purge_product(&self, product_id: ProductId) -> DomainResult<u64>;
}
