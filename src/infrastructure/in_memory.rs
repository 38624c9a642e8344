use crate::domain::payment::{Payment, PaymentStatus, TerminalStatus};
use crate::domain::ports::PaymentStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    payments: HashMap<Uuid, Arc<Mutex<Payment>>>,
    references: HashMap<String, Uuid>,
}

/// A thread-safe in-memory payment store.
///
/// The table lock only guards the indexes; every record sits behind its own
/// `Mutex`, which is what a conditional transition holds across its check and
/// write. Transitions on different payments therefore never wait on each other.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payments.
    pub async fn len(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn record(&self, id: Uuid) -> Result<Arc<Mutex<Payment>>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .payments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, mut payment: Payment) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.references.contains_key(&payment.reference) {
            return Err(StoreError::DuplicateReference(payment.reference));
        }
        payment.status = PaymentStatus::Pending;
        payment.updated_at = payment.created_at;

        tables.references.insert(payment.reference.clone(), payment.id);
        tables
            .payments
            .insert(payment.id, Arc::new(Mutex::new(payment.clone())));
        Ok(payment)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError> {
        let record = self.record(id).await?;
        let payment = record.lock().await;
        Ok(payment.clone())
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.references.contains_key(reference))
    }

    async fn conditional_transition(
        &self,
        id: Uuid,
        target: TerminalStatus,
    ) -> Result<Payment, StoreError> {
        let record = self.record(id).await?;
        // Held until the end of the scope: check and write see the same state.
        let mut payment = record.lock().await;
        payment
            .transition(target)
            .map_err(|status| StoreError::AlreadyProcessed { id, status })?;
        Ok(payment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, Currency};
    use rust_decimal_macros::dec;

    fn payment(reference: &str) -> Payment {
        Payment::new(Amount::new(dec!(100.50)).unwrap(), Currency::Usd, reference)
    }

    #[tokio::test]
    async fn test_in_memory_create_and_get() {
        let store = InMemoryPaymentStore::new();
        let created = store.create(payment("REF-1")).await.unwrap();

        let retrieved = store.get_by_id(created.id).await.unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.status, PaymentStatus::Pending);
        assert!(store.reference_exists("REF-1").await.unwrap());
        assert!(!store.reference_exists("REF-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_forces_pending() {
        let store = InMemoryPaymentStore::new();
        let mut p = payment("REF-1");
        p.status = PaymentStatus::Success;

        let created = store.create(p).await.unwrap();
        assert_eq!(created.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemoryPaymentStore::new();
        store.create(payment("REF-1")).await.unwrap();

        let err = store.create(payment("REF-1")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateReference("REF-1".into()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let store = InMemoryPaymentStore::new();
        let id = Uuid::new_v4();

        assert_eq!(store.get_by_id(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(
            store
                .conditional_transition(id, TerminalStatus::Success)
                .await,
            Err(StoreError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn test_second_transition_refused() {
        let store = InMemoryPaymentStore::new();
        let created = store.create(payment("REF-1")).await.unwrap();

        let first = store
            .conditional_transition(created.id, TerminalStatus::Success)
            .await
            .unwrap();
        assert_eq!(first.status, PaymentStatus::Success);
        assert!(first.updated_at >= first.created_at);

        let second = store
            .conditional_transition(created.id, TerminalStatus::Failed)
            .await;
        assert_eq!(
            second,
            Err(StoreError::AlreadyProcessed {
                id: created.id,
                status: PaymentStatus::Success
            })
        );
        assert_eq!(
            store.get_by_id(created.id).await.unwrap().status,
            PaymentStatus::Success
        );
    }

    #[tokio::test]
    async fn test_held_record_lock_does_not_block_other_records() {
        let store = InMemoryPaymentStore::new();
        let a = store.create(payment("REF-A")).await.unwrap();
        let b = store.create(payment("REF-B")).await.unwrap();

        let record_a = store.record(a.id).await.unwrap();
        let _guard = record_a.lock().await;

        // `a` is locked for as long as `_guard` lives; `b` must still go through.
        let moved = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.conditional_transition(b.id, TerminalStatus::Failed),
        )
        .await
        .expect("transition on another record blocked")
        .unwrap();
        assert_eq!(moved.status, PaymentStatus::Failed);
    }
}
