use super::processor::{PaymentProcessor, ProcessOutcome};
use crate::domain::notice::TriggerNotice;
use crate::domain::ports::Disposition;
use tracing::{info, warn};

/// How a delivery was handled, for the worker's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Outcome(ProcessOutcome),
    /// The notice could not be decoded.
    Malformed { dropped: bool },
}

impl Handled {
    /// The channel action this result calls for.
    ///
    /// A malformed notice gets one redelivery, in case the corruption happened
    /// in transit, and is dropped the second time round.
    pub fn disposition(&self) -> Disposition {
        match self {
            Handled::Outcome(ProcessOutcome::TransientFailure(_)) => Disposition::Requeue,
            Handled::Outcome(_) => Disposition::Ack,
            Handled::Malformed { dropped: false } => Disposition::Requeue,
            Handled::Malformed { dropped: true } => Disposition::Ack,
        }
    }
}

/// Bridges channel redelivery to the processor's idempotent contract.
pub struct DeliveryAdapter {
    processor: PaymentProcessor,
}

impl DeliveryAdapter {
    pub fn new(processor: PaymentProcessor) -> Self {
        Self { processor }
    }

    /// Decodes and processes one notice body.
    ///
    /// Only returns after the processor is done, so an ack issued on the result
    /// never precedes the transition's commit.
    pub async fn handle(&self, body: &[u8], redelivered: bool) -> Handled {
        let notice = match TriggerNotice::decode(body) {
            Ok(notice) => notice,
            Err(e) => {
                if redelivered {
                    warn!(error = %e, "dropping malformed notice after redelivery");
                } else {
                    warn!(error = %e, "malformed notice, requeueing once");
                }
                return Handled::Malformed {
                    dropped: redelivered,
                };
            }
        };

        let outcome = self.processor.process(notice.payment_id).await;
        match &outcome {
            ProcessOutcome::Processed(status) => {
                info!(payment_id = %notice.payment_id, %status, "notice handled");
            }
            ProcessOutcome::AlreadyProcessed(_) => {
                info!(payment_id = %notice.payment_id, redelivered, "duplicate notice absorbed");
            }
            ProcessOutcome::PermanentFailure(reason) => {
                warn!(payment_id = %notice.payment_id, %reason, "dropping notice");
            }
            ProcessOutcome::TransientFailure(reason) => {
                warn!(payment_id = %notice.payment_id, %reason, "requeueing notice");
            }
        }
        Handled::Outcome(outcome)
    }
}
