use super::delivery::DeliveryAdapter;
use super::processor::PaymentProcessor;
use super::service::PaymentService;
use super::worker::{Worker, WorkerStats};
use crate::domain::ports::{PaymentDeciderRef, PaymentStoreRef};
use crate::error::ChannelError;
use crate::infrastructure::broker::{BrokerPublisher, InMemoryBroker, PREFETCH_COUNT, QUEUE_NAME};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The whole processing pipeline running in one process.
///
/// Owns the creation service, the trigger channel and a pool of competing
/// workers, all sharing one payment store.
pub struct PaymentPipeline {
    service: PaymentService,
    broker: InMemoryBroker,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<WorkerStats>>,
}

impl PaymentPipeline {
    /// Declares the channel topology and spawns `workers` consumer loops.
    pub fn start(
        store: PaymentStoreRef,
        decider: PaymentDeciderRef,
        workers: usize,
    ) -> Result<Self, ChannelError> {
        let broker = InMemoryBroker::with_payment_topology()?;
        let service = PaymentService::new(
            Arc::clone(&store),
            Arc::new(BrokerPublisher::new(broker.clone())),
        );
        let adapter = Arc::new(DeliveryAdapter::new(PaymentProcessor::new(store, decider)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = (0..workers.max(1))
            .map(|n| -> Result<_, ChannelError> {
                let consumer = broker.consumer(QUEUE_NAME, PREFETCH_COUNT)?;
                let worker = Worker::new(format!("worker-{}", n), consumer, Arc::clone(&adapter));
                Ok(tokio::spawn(worker.run(shutdown_rx.clone())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(workers = workers.len(), "payment pipeline started");

        Ok(Self {
            service,
            broker,
            shutdown_tx,
            workers,
        })
    }

    pub fn service(&self) -> &PaymentService {
        &self.service
    }

    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Waits until every queued notice has been settled.
    pub async fn drain(&self) -> Result<(), ChannelError> {
        self.broker.drained(QUEUE_NAME).await
    }

    /// Stops the workers once their current notice is settled.
    pub async fn shutdown(self) -> Vec<WorkerStats> {
        let _ = self.shutdown_tx.send(true);
        let mut stats = Vec::with_capacity(self.workers.len());
        for handle in self.workers {
            match handle.await {
                Ok(s) => stats.push(s),
                Err(e) => warn!(error = %e, "payment worker task failed"),
            }
        }
        self.broker.close();
        stats
    }
}
