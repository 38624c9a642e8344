use crate::domain::payment::{PaymentStatus, TerminalStatus};
use crate::domain::ports::{PaymentDecider, PaymentDeciderRef, PaymentStoreRef};
use crate::error::{DecisionError, StoreError};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened when a payment was handed to the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// This call moved the payment to its terminal status.
    Processed(TerminalStatus),
    /// An earlier call already did; nothing was written.
    AlreadyProcessed(PaymentStatus),
    /// Retrying can never succeed.
    PermanentFailure(String),
    /// Retrying later may succeed.
    TransientFailure(String),
}

/// Moves pending payments to a terminal status.
///
/// Safe to call any number of times, from any number of workers, for the same
/// payment: the store's conditional transition lets exactly one call through.
pub struct PaymentProcessor {
    store: PaymentStoreRef,
    decider: PaymentDeciderRef,
}

impl PaymentProcessor {
    pub fn new(store: PaymentStoreRef, decider: PaymentDeciderRef) -> Self {
        Self { store, decider }
    }

    pub async fn process(&self, payment_id: Uuid) -> ProcessOutcome {
        let decided = match self.decider.decide(payment_id).await {
            Ok(status) => status,
            Err(DecisionError::Transient(reason)) => {
                warn!(%payment_id, %reason, "no decision reached");
                return ProcessOutcome::TransientFailure(reason);
            }
        };

        match self.store.conditional_transition(payment_id, decided).await {
            Ok(payment) => {
                info!(%payment_id, status = %payment.status, "payment processed");
                ProcessOutcome::Processed(decided)
            }
            Err(StoreError::AlreadyProcessed { status, .. }) => {
                debug!(%payment_id, %status, "payment already processed");
                ProcessOutcome::AlreadyProcessed(status)
            }
            Err(StoreError::NotFound(_)) => {
                warn!(%payment_id, "payment not found");
                ProcessOutcome::PermanentFailure(format!("payment {} not found", payment_id))
            }
            Err(e) => {
                warn!(%payment_id, error = %e, "payment transition failed");
                ProcessOutcome::TransientFailure(e.to_string())
            }
        }
    }
}

/// Stand-in for an external authorizer: succeeds with a fixed probability,
/// optionally after a simulated processing delay.
#[derive(Debug, Clone)]
pub struct RandomDecider {
    success_rate: f64,
    max_latency: Duration,
}

impl RandomDecider {
    /// `success_rate` is clamped to `0.0..=1.0`; NaN counts as `0.0`.
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            max_latency: Duration::ZERO,
        }
    }

    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }
}

impl Default for RandomDecider {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl PaymentDecider for RandomDecider {
    async fn decide(&self, _payment_id: Uuid) -> Result<TerminalStatus, DecisionError> {
        let (succeeded, latency) = {
            let mut rng = rand::thread_rng();
            let latency = if self.max_latency.is_zero() {
                Duration::ZERO
            } else {
                rng.gen_range(Duration::ZERO..=self.max_latency)
            };
            (rng.gen_bool(self.success_rate), latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(if succeeded {
            TerminalStatus::Success
        } else {
            TerminalStatus::Failed
        })
    }
}

/// Always reaches the same verdict.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecider(pub TerminalStatus);

#[async_trait]
impl PaymentDecider for FixedDecider {
    async fn decide(&self, _payment_id: Uuid) -> Result<TerminalStatus, DecisionError> {
        Ok(self.0)
    }
}
