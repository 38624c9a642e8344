#![allow(dead_code)]

use async_trait::async_trait;
use payflow::application::service::CreatePaymentRequest;
use payflow::domain::notice::TriggerNotice;
use payflow::domain::payment::{Payment, TerminalStatus};
use payflow::domain::ports::{PaymentStore, TriggerPublisher};
use payflow::error::{ChannelError, StoreError};
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub fn request(amount: Decimal, currency: &str, reference: &str) -> CreatePaymentRequest {
    CreatePaymentRequest::new(amount, currency, reference)
}

/// Remembers every notice it is asked to publish.
#[derive(Default)]
pub struct RecordingPublisher {
    pub notices: Mutex<Vec<TriggerNotice>>,
}

impl RecordingPublisher {
    pub fn count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

#[async_trait]
impl TriggerPublisher for RecordingPublisher {
    async fn publish(&self, notice: &TriggerNotice) -> Result<(), ChannelError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// A channel that is always down.
pub struct FailingPublisher;

#[async_trait]
impl TriggerPublisher for FailingPublisher {
    async fn publish(&self, _notice: &TriggerNotice) -> Result<(), ChannelError> {
        Err(ChannelError::Closed)
    }
}

/// An in-memory store with scripted failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryPaymentStore,
    /// Transitions to fail with `Unavailable` before letting calls through.
    pub failing_transitions: AtomicUsize,
    /// Makes every existence check fail with `Unavailable`.
    pub existence_check_down: bool,
    /// Makes every existence check answer "no", as if it lost a race.
    pub existence_check_blind: bool,
}

impl FlakyStore {
    pub fn failing_transitions(n: usize) -> Self {
        Self {
            failing_transitions: AtomicUsize::new(n),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PaymentStore for FlakyStore {
    async fn create(&self, payment: Payment) -> Result<Payment, StoreError> {
        self.inner.create(payment).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError> {
        if self.existence_check_down {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        if self.existence_check_blind {
            return Ok(false);
        }
        self.inner.reference_exists(reference).await
    }

    async fn conditional_transition(
        &self,
        id: Uuid,
        target: TerminalStatus,
    ) -> Result<Payment, StoreError> {
        let remaining = self
            .failing_transitions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(StoreError::Unavailable("lock wait timeout".into()));
        }
        self.inner.conditional_transition(id, target).await
    }
}
