//! The stock ledger service: check-then-append under a per-product lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_core::{DomainError, DomainResult, ProductId};

use crate::movement::{Movement, NewMovement};
use crate::store::LedgerBackend;

/// Outcome of a product deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub product_id: ProductId,
    pub movements_deleted: u64,
    pub forced: bool,
}

/// Owns the movement log per product and guarantees the non-negative-stock
/// invariant is never violated by a newly accepted movement.
///
/// The sum-check-append sequence runs while holding an async lock keyed by
/// product id, so two concurrent outbound movements against the same product
/// cannot both pass the check against the same pre-decrement sum. Locks are
/// created on first use and never dropped; one entry per product ever moved.
pub struct StockLedger<B: ?Sized> {
    backend: Arc<B>,
    locks: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<B: LedgerBackend + ?Sized> StockLedger<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn lock_for(&self, product_id: ProductId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(product_id).or_default().clone()
    }

    /// Derived stock for one product: signed sum over the committed log.
    ///
    /// No existence check; callers decide whether an unknown product is an
    /// error. Zero when no movements exist.
    pub async fn stock_of(&self, product_id: ProductId) -> DomainResult<Decimal> {
        self.backend.movement_sum(product_id).await
    }

    /// Committed movements for one product, in insertion order.
    pub async fn movements_for(&self, product_id: ProductId) -> DomainResult<Vec<Movement>> {
        self.backend.movements_for(product_id).await
    }

    /// Validate and append a movement, rejecting any outbound entry that
    /// would drive the derived stock negative.
    pub async fn record(&self, cmd: NewMovement) -> DomainResult<Movement> {
        cmd.validate()?;

        if !self.backend.product_exists(cmd.product_id).await? {
            return Err(DomainError::not_found("product", cmd.product_id));
        }
        if !self.backend.warehouse_exists(cmd.warehouse_id).await? {
            return Err(DomainError::not_found("warehouse", cmd.warehouse_id));
        }

        let lock = self.lock_for(cmd.product_id);
        let _guard = lock.lock().await;

        // The purge path holds this same lock, so a product deleted while we
        // waited is caught before anything lands in its log.
        if !self.backend.product_exists(cmd.product_id).await? {
            return Err(DomainError::not_found("product", cmd.product_id));
        }

        let current = self.backend.movement_sum(cmd.product_id).await?;
        let delta = cmd.signed_quantity();
        if current + delta < Decimal::ZERO {
            return Err(DomainError::InsufficientStock {
                product_id: cmd.product_id,
                available: current,
                requested: cmd.quantity,
            });
        }

        let movement = cmd.into_movement(Utc::now());
        self.backend.append(&movement).await?;
        Ok(movement)
    }

    /// Remove a product; without `force`, refuse while ledger history exists.
    /// With `force`, the product and its entire movement log go together as
    /// one atomic unit.
    pub async fn delete_product(
        &self,
        product_id: ProductId,
        force: bool,
    ) -> DomainResult<PurgeReport> {
        if !self.backend.product_exists(product_id).await? {
            return Err(DomainError::not_found("product", product_id));
        }

        let lock = self.lock_for(product_id);
        let _guard = lock.lock().await;

        if force {
            let movements_deleted = self.backend.purge_product(product_id).await?;
            return Ok(PurgeReport {
                product_id,
                movements_deleted,
                forced: true,
            });
        }

        if self.backend.has_movements(product_id).await? {
            return Err(DomainError::HasMovements { product_id });
        }
        self.backend.delete_product(product_id).await?;
        Ok(PurgeReport {
            product_id,
            movements_deleted: 0,
            forced: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use stockroom_core::WarehouseId;

    use crate::movement::MovementKind;
    use crate::stock::stock_level;

    #[derive(Default)]
    struct State {
        products: HashSet<ProductId>,
        warehouses: HashSet<WarehouseId>,
        movements: Vec<Movement>,
    }

    /// In-memory backend for service tests. `movement_sum` yields once so
    /// concurrent tasks actually interleave inside the check window.
    #[derive(Default)]
    struct TestBackend {
        state: Mutex<State>,
        fail_purges: bool,
        hold_warehouse_checks: Option<Arc<tokio::sync::Notify>>,
    }

    impl TestBackend {
        fn with_product(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
            let backend = Self::default();
            {
                let mut state = backend.state.lock().unwrap();
                state.products.insert(product_id);
                state.warehouses.insert(warehouse_id);
            }
            backend
        }

        fn log_len(&self) -> usize {
            self.state.lock().unwrap().movements.len()
        }
    }

    #[async_trait]
    impl LedgerBackend for TestBackend {
        async fn product_exists(&self, product_id: ProductId) -> DomainResult<bool> {
            Ok(self.state.lock().unwrap().products.contains(&product_id))
        }

        async fn warehouse_exists(&self, warehouse_id: WarehouseId) -> DomainResult<bool> {
            if let Some(gate) = &self.hold_warehouse_checks {
                gate.notified().await;
            }
            Ok(self.state.lock().unwrap().warehouses.contains(&warehouse_id))
        }

        async fn movement_sum(&self, product_id: ProductId) -> DomainResult<Decimal> {
            let sum = {
                let state = self.state.lock().unwrap();
                stock_level(state.movements.iter().filter(|m| m.product_id == product_id))
            };
            tokio::task::yield_now().await;
            Ok(sum)
        }

        async fn has_movements(&self, product_id: ProductId) -> DomainResult<bool> {
            let state = self.state.lock().unwrap();
            Ok(state.movements.iter().any(|m| m.product_id == product_id))
        }

        async fn movements_for(&self, product_id: ProductId) -> DomainResult<Vec<Movement>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .movements
                .iter()
                .filter(|m| m.product_id == product_id)
                .cloned()
                .collect())
        }

        async fn append(&self, movement: &Movement) -> DomainResult<()> {
            self.state.lock().unwrap().movements.push(movement.clone());
            Ok(())
        }

        async fn delete_product(&self, product_id: ProductId) -> DomainResult<()> {
            self.state.lock().unwrap().products.remove(&product_id);
            Ok(())
        }

        async fn purge_product(&self, product_id: ProductId) -> DomainResult<u64> {
            if self.fail_purges {
                return Err(DomainError::storage("purge aborted"));
            }
            let mut state = self.state.lock().unwrap();
            let before = state.movements.len();
            state.movements.retain(|m| m.product_id != product_id);
            let deleted = (before - state.movements.len()) as u64;
            state.products.remove(&product_id);
            Ok(deleted)
        }
    }

    fn ledger_with_product() -> (StockLedger<TestBackend>, ProductId, WarehouseId) {
        let product_id = ProductId::new();
        let warehouse_id = WarehouseId::new();
        let backend = TestBackend::with_product(product_id, warehouse_id);
        (StockLedger::new(Arc::new(backend)), product_id, warehouse_id)
    }

    fn cmd(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        kind: MovementKind,
        quantity: Decimal,
    ) -> NewMovement {
        NewMovement {
            product_id,
            warehouse_id,
            kind,
            quantity,
            moved_at: None,
            reference: None,
        }
    }

    #[tokio::test]
    async fn stock_of_product_without_movements_is_zero() {
        let (ledger, product_id, _) = ledger_with_product();
        assert_eq!(ledger.stock_of(product_id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn inbound_raises_stock() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.stock_of(product_id).await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn outbound_within_stock_is_accepted() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(100)))
            .await
            .unwrap();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::Out, dec!(30)))
            .await
            .unwrap();
        assert_eq!(ledger.stock_of(product_id).await.unwrap(), dec!(70));
    }

    #[tokio::test]
    async fn outbound_beyond_stock_is_rejected_and_log_unchanged() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(70)))
            .await
            .unwrap();

        let len_before = ledger.backend().log_len();
        let err = ledger
            .record(cmd(product_id, warehouse_id, MovementKind::Out, dec!(200)))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id,
                available: dec!(70),
                requested: dec!(200),
            }
        );
        assert_eq!(ledger.backend().log_len(), len_before);
        assert_eq!(ledger.stock_of(product_id).await.unwrap(), dec!(70));
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let (ledger, _, warehouse_id) = ledger_with_product();
        let err = ledger
            .record(cmd(ProductId::new(), warehouse_id, MovementKind::In, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn unknown_warehouse_is_rejected() {
        let (ledger, product_id, _) = ledger_with_product();
        let err = ledger
            .record(cmd(product_id, WarehouseId::new(), MovementKind::In, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "warehouse", .. }));
    }

    #[tokio::test]
    async fn stock_read_is_idempotent() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(12.5)))
            .await
            .unwrap();
        let first = ledger.stock_of(product_id).await.unwrap();
        let second = ledger.stock_of(product_id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn delete_without_force_is_blocked_by_history() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(5)))
            .await
            .unwrap();

        let err = ledger.delete_product(product_id, false).await.unwrap_err();
        assert_eq!(err, DomainError::HasMovements { product_id });

        // Product and its log are untouched.
        assert!(ledger.backend().product_exists(product_id).await.unwrap());
        assert_eq!(ledger.backend().log_len(), 1);
    }

    #[tokio::test]
    async fn delete_without_force_removes_movement_free_product() {
        let (ledger, product_id, _) = ledger_with_product();
        let report = ledger.delete_product(product_id, false).await.unwrap();
        assert_eq!(report.movements_deleted, 0);
        assert!(!ledger.backend().product_exists(product_id).await.unwrap());
    }

    #[tokio::test]
    async fn forced_delete_purges_product_and_log() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        for _ in 0..3 {
            ledger
                .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(1)))
                .await
                .unwrap();
        }

        let report = ledger.delete_product(product_id, true).await.unwrap();
        assert_eq!(report.movements_deleted, 3);
        assert!(report.forced);
        assert!(!ledger.backend().product_exists(product_id).await.unwrap());
        assert_eq!(ledger.backend().log_len(), 0);
    }

    #[tokio::test]
    async fn failed_purge_leaves_product_and_log_intact() {
        let product_id = ProductId::new();
        let warehouse_id = WarehouseId::new();
        let mut backend = TestBackend::with_product(product_id, warehouse_id);
        backend.fail_purges = true;
        let ledger = StockLedger::new(Arc::new(backend));

        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(2)))
            .await
            .unwrap();

        let err = ledger.delete_product(product_id, true).await.unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
        assert!(ledger.backend().product_exists(product_id).await.unwrap());
        assert_eq!(ledger.backend().log_len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_product_is_not_found() {
        let (ledger, _, _) = ledger_with_product();
        let err = ledger.delete_product(ProductId::new(), true).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn record_cannot_append_to_a_concurrently_purged_product() {
        let product_id = ProductId::new();
        let warehouse_id = WarehouseId::new();
        let mut backend = TestBackend::with_product(product_id, warehouse_id);
        let gate = Arc::new(tokio::sync::Notify::new());
        backend.hold_warehouse_checks = Some(gate.clone());
        let ledger = Arc::new(StockLedger::new(Arc::new(backend)));

        // Park a record inside its reference checks, before it takes the
        // product lock, and purge the product in that window.
        let recorder = tokio::spawn({
            let ledger = ledger.clone();
            async move {
                ledger
                    .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(1)))
                    .await
            }
        });
        tokio::task::yield_now().await;

        ledger.delete_product(product_id, true).await.unwrap();
        gate.notify_one();

        let err = recorder.await.unwrap().unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(!ledger.backend().has_movements(product_id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_outbound_movements_never_oversell() {
        let (ledger, product_id, warehouse_id) = ledger_with_product();
        let ledger = Arc::new(ledger);

        ledger
            .record(cmd(product_id, warehouse_id, MovementKind::In, dec!(100)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record(cmd(product_id, warehouse_id, MovementKind::Out, dec!(20)))
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        // 100 in stock, 10 attempts of 20: exactly 5 can be accepted.
        assert_eq!(accepted, 5);
        assert_eq!(ledger.stock_of(product_id).await.unwrap(), Decimal::ZERO);
    }
}

