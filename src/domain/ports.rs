use super::notice::TriggerNotice;
use super::payment::{Payment, TerminalStatus};
use crate::error::{ChannelError, DecisionError, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Durable keyed storage for payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts `payment` in the `PENDING` state whatever status it carries.
    ///
    /// Fails with [`StoreError::DuplicateReference`] when the reference is taken,
    /// even if a concurrent `create` raced the caller's existence check.
    async fn create(&self, payment: Payment) -> Result<Payment, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError>;

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError>;

    /// Atomically moves a `PENDING` payment to `target`.
    ///
    /// The status check and the write happen under one exclusive lock scoped to
    /// this record, so of any number of concurrent calls for the same `id` exactly
    /// one succeeds. Every other call fails with [`StoreError::AlreadyProcessed`]
    /// and writes nothing.
    async fn conditional_transition(
        &self,
        id: Uuid,
        target: TerminalStatus,
    ) -> Result<Payment, StoreError>;
}

#[async_trait]
pub trait TriggerPublisher: Send + Sync {
    async fn publish(&self, notice: &TriggerNotice) -> Result<(), ChannelError>;
}

/// How a consumed notice leaves the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the notice from the channel.
    Ack,
    /// Put the notice back for redelivery, possibly to another consumer.
    Requeue,
}

/// A notice handed to a consumer and not yet settled.
pub trait InboundDelivery: Send + Sync {
    fn body(&self) -> &[u8];

    /// Whether the channel has handed this notice out before.
    fn redelivered(&self) -> bool;

    fn settle(self, disposition: Disposition) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait TriggerConsumer: Send {
    type Delivery: InboundDelivery;

    /// Waits for the next notice, or `None` once the channel is closed.
    async fn next_delivery(&mut self) -> Option<Self::Delivery>;
}

/// Decides how a pending payment ends.
///
/// A real deployment would call an external authorizer here.
#[async_trait]
pub trait PaymentDecider: Send + Sync {
    async fn decide(&self, payment_id: Uuid) -> Result<TerminalStatus, DecisionError>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type TriggerPublisherRef = Arc<dyn TriggerPublisher>;
pub type PaymentDeciderRef = Arc<dyn PaymentDecider>;

