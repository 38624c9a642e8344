//! An in-process, at-least-once trigger channel.
//!
//! Models the subset of an AMQP broker the processing pipeline relies on:
//! a direct exchange routing to bound queues, competing consumers with a
//! per-consumer prefetch limit, explicit ack / reject-with-requeue, and the
//! `redelivered` flag. A delivery dropped without being settled goes back to
//! the head of its queue, the same as a consumer connection dying mid-notice.

use crate::domain::notice::TriggerNotice;
use crate::domain::ports::{Disposition, InboundDelivery, TriggerConsumer, TriggerPublisher};
use crate::error::ChannelError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

pub const EXCHANGE_NAME: &str = "payments";
pub const QUEUE_NAME: &str = "payment_processing";
pub const ROUTING_KEY: &str = "payment.created";
/// Notices a consumer may hold unacknowledged at once.
pub const PREFETCH_COUNT: usize = 1;

struct Envelope {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueBuffer {
    ready: VecDeque<Envelope>,
    unacked: usize,
    closed: bool,
}

struct Queue {
    name: String,
    buffer: Mutex<QueueBuffer>,
    /// Signalled whenever a notice becomes ready or the queue closes.
    available: Notify,
    /// Signalled whenever a notice is settled.
    settled: Notify,
}

impl Queue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            buffer: Mutex::new(QueueBuffer::default()),
            available: Notify::new(),
            settled: Notify::new(),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, QueueBuffer> {
        // Nothing panics while holding this lock; recover the data if it ever does.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, body: Vec<u8>) -> Result<(), ChannelError> {
        {
            let mut buffer = self.buffer();
            if buffer.closed {
                return Err(ChannelError::Closed);
            }
            buffer.ready.push_back(Envelope {
                body,
                redelivered: false,
            });
        }
        self.available.notify_waiters();
        Ok(())
    }

    fn take(&self) -> Result<Option<Envelope>, ChannelError> {
        let mut buffer = self.buffer();
        match buffer.ready.pop_front() {
            Some(envelope) => {
                buffer.unacked += 1;
                Ok(Some(envelope))
            }
            None if buffer.closed => Err(ChannelError::Closed),
            None => Ok(None),
        }
    }

    fn settle(&self, body: Vec<u8>, disposition: Disposition) {
        {
            let mut buffer = self.buffer();
            buffer.unacked = buffer.unacked.saturating_sub(1);
            if disposition == Disposition::Requeue {
                buffer.ready.push_front(Envelope {
                    body,
                    redelivered: true,
                });
            }
        }
        self.settled.notify_waiters();
        if disposition == Disposition::Requeue {
            self.available.notify_waiters();
        }
    }

    fn is_drained(&self) -> bool {
        let buffer = self.buffer();
        buffer.ready.is_empty() && buffer.unacked == 0
    }
}

#[derive(Default)]
struct Topology {
    queues: HashMap<String, Arc<Queue>>,
    bindings: HashMap<(String, String), Vec<Arc<Queue>>>,
}

/// Handle to the broker; clones share the same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    topology: Arc<Mutex<Topology>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker with the payment exchange, queue and binding declared.
    pub fn with_payment_topology() -> Result<Self, ChannelError> {
        let broker = Self::new();
        broker.declare_queue(QUEUE_NAME);
        broker.bind(QUEUE_NAME, EXCHANGE_NAME, ROUTING_KEY)?;
        Ok(broker)
    }

    fn topology(&self) -> MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn queue(&self, name: &str) -> Result<Arc<Queue>, ChannelError> {
        self.topology()
            .queues
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownQueue(name.to_string()))
    }

    /// Declares a queue. Redeclaring an existing queue is a no-op.
    pub fn declare_queue(&self, name: &str) {
        self.topology()
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Queue::new(name)));
    }

    pub fn bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), ChannelError> {
        let target = self.queue(queue)?;
        let mut topology = self.topology();
        let bound = topology
            .bindings
            .entry((exchange.to_string(), routing_key.to_string()))
            .or_default();
        if !bound.iter().any(|q| Arc::ptr_eq(q, &target)) {
            bound.push(target);
        }
        Ok(())
    }

    /// Routes `body` to every queue bound to `exchange` under `routing_key`.
    pub fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), ChannelError> {
        let targets = self
            .topology()
            .bindings
            .get(&(exchange.to_string(), routing_key.to_string()))
            .cloned()
            .unwrap_or_default();
        if targets.is_empty() {
            return Err(ChannelError::Unroutable {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
            });
        }
        for queue in targets {
            queue.push(body.to_vec())?;
            debug!(queue = %queue.name, "notice enqueued");
        }
        Ok(())
    }

    /// Registers a competing consumer on `queue` with `prefetch` in-flight slots.
    pub fn consumer(&self, queue: &str, prefetch: usize) -> Result<QueueConsumer, ChannelError> {
        Ok(QueueConsumer {
            queue: self.queue(queue)?,
            slots: Arc::new(Semaphore::new(prefetch.max(1))),
        })
    }

    /// Resolves once `queue` holds no ready and no unacknowledged notices.
    pub async fn drained(&self, queue: &str) -> Result<(), ChannelError> {
        let queue = self.queue(queue)?;
        loop {
            let settled = queue.settled.notified();
            if queue.is_drained() {
                return Ok(());
            }
            settled.await;
        }
    }

    /// Closes every queue: publishing fails and idle consumers see the end.
    pub fn close(&self) {
        let queues: Vec<_> = self.topology().queues.values().cloned().collect();
        for queue in queues {
            queue.buffer().closed = true;
            queue.available.notify_waiters();
        }
    }
}

/// Publishes trigger notices to the payment exchange.
#[derive(Clone)]
pub struct BrokerPublisher {
    broker: InMemoryBroker,
    exchange: String,
    routing_key: String,
}

impl BrokerPublisher {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self {
            broker,
            exchange: EXCHANGE_NAME.to_string(),
            routing_key: ROUTING_KEY.to_string(),
        }
    }
}

#[async_trait]
impl TriggerPublisher for BrokerPublisher {
    async fn publish(&self, notice: &TriggerNotice) -> Result<(), ChannelError> {
        let body = notice.encode()?;
        self.broker
            .publish(&self.exchange, &self.routing_key, &body)
    }
}

pub struct QueueConsumer {
    queue: Arc<Queue>,
    slots: Arc<Semaphore>,
}

#[async_trait]
impl TriggerConsumer for QueueConsumer {
    type Delivery = QueueDelivery;

    async fn next_delivery(&mut self) -> Option<QueueDelivery> {
        let permit = Arc::clone(&self.slots).acquire_owned().await.ok()?;
        loop {
            let available = self.queue.available.notified();
            match self.queue.take() {
                Ok(Some(envelope)) => {
                    return Some(QueueDelivery {
                        queue: Some(Arc::clone(&self.queue)),
                        body: envelope.body,
                        redelivered: envelope.redelivered,
                        _permit: permit,
                    });
                }
                Ok(None) => available.await,
                Err(_) => return None,
            }
        }
    }
}

/// A notice checked out of its queue.
///
/// Dropping it unsettled requeues it as redelivered.
pub struct QueueDelivery {
    queue: Option<Arc<Queue>>,
    body: Vec<u8>,
    redelivered: bool,
    _permit: OwnedSemaphorePermit,
}

impl InboundDelivery for QueueDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    fn settle(mut self, disposition: Disposition) -> Result<(), ChannelError> {
        let queue = self.queue.take().ok_or(ChannelError::Closed)?;
        queue.settle(std::mem::take(&mut self.body), disposition);
        Ok(())
    }
}

impl Drop for QueueDelivery {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.settle(std::mem::take(&mut self.body), Disposition::Requeue);
        }
    }
}
