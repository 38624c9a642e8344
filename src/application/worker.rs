use super::delivery::{DeliveryAdapter, Handled};
use super::processor::ProcessOutcome;
use crate::domain::ports::{InboundDelivery, TriggerConsumer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Per-worker counters, returned when the loop stops.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkerStats {
    pub processed: usize,
    pub already_processed: usize,
    pub permanent_failures: usize,
    pub requeued: usize,
    pub malformed_dropped: usize,
}

impl WorkerStats {
    fn record(&mut self, handled: &Handled) {
        match handled {
            Handled::Outcome(ProcessOutcome::Processed(_)) => self.processed += 1,
            Handled::Outcome(ProcessOutcome::AlreadyProcessed(_)) => self.already_processed += 1,
            Handled::Outcome(ProcessOutcome::PermanentFailure(_)) => self.permanent_failures += 1,
            Handled::Outcome(ProcessOutcome::TransientFailure(_))
            | Handled::Malformed { dropped: false } => self.requeued += 1,
            Handled::Malformed { dropped: true } => self.malformed_dropped += 1,
        }
    }
}

/// One consumer loop.
///
/// Handles notices strictly one after another. Shutdown is only observed
/// between notices; an in-flight notice is always finished and settled first.
pub struct Worker<C: TriggerConsumer> {
    name: String,
    consumer: C,
    adapter: Arc<DeliveryAdapter>,
}

impl<C: TriggerConsumer> Worker<C> {
    pub fn new(name: impl Into<String>, consumer: C, adapter: Arc<DeliveryAdapter>) -> Self {
        Self {
            name: name.into(),
            consumer,
            adapter,
        }
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(worker = %self.name, "payment worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let delivery = tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    // A dropped sender means nobody can stop us any more; stop now.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                delivery = self.consumer.next_delivery() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let handled = self
                .adapter
                .handle(delivery.body(), delivery.redelivered())
                .await;
            stats.record(&handled);
            if let Err(e) = delivery.settle(handled.disposition()) {
                warn!(worker = %self.name, error = %e, "failed to settle notice");
            }
        }

        info!(worker = %self.name, ?stats, "payment worker stopped");
        stats
    }
}
