//! In-memory broker for exercising the publish sequence without RabbitMQ.
//!
//! Records every capability call in order and can be told to fail or stall
//! at a chosen step.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::broker::{
    Broker, BrokerChannel, BrokerConnection, ExchangeDeclaration, Publication, QueueBinding,
    QueueDeclaration,
};
use super::errors::BrokerError;

/// A recorded capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Dial { uri: String },
    OpenChannel,
    DeclareExchange(ExchangeDeclaration),
    DeclareQueue(QueueDeclaration),
    BindQueue(QueueBinding),
    Publish(Publication),
    Close,
}

/// Step at which the mock returns an error, or stops answering, instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Dial,
    OpenChannel,
    DeclareExchange,
    DeclareQueue,
    BindQueue,
    Publish,
    Close,
}

/// How long a stalled step sleeps; far beyond any connect timeout.
const STALL: Duration = Duration::from_secs(24 * 60 * 60);

// A panicking test must not poison the recorder for the others.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct MockState {
    events: Mutex<Vec<BrokerEvent>>,
    fail_at: Mutex<Option<FailurePoint>>,
    stall_at: Mutex<Option<FailurePoint>>,
}

impl MockState {
    async fn record(&self, event: BrokerEvent, point: FailurePoint) -> Result<(), BrokerError> {
        lock(&self.events).push(event);
        let stalled = *lock(&self.stall_at) == Some(point);
        if stalled {
            tokio::time::sleep(STALL).await;
        }
        if *lock(&self.fail_at) == Some(point) {
            return Err(format!("mock broker failure at {:?}", point).into());
        }
        Ok(())
    }
}

/// Mock implementation of the `Broker` capability.
///
/// Clones share the same recorded state, so a test can keep one handle
/// while the client owns another.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<MockState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(point: FailurePoint) -> Self {
        let broker = Self::new();
        broker.fail_at(Some(point));
        broker
    }

    pub fn stalling_at(point: FailurePoint) -> Self {
        let broker = Self::new();
        broker.stall_at(Some(point));
        broker
    }

    pub fn fail_at(&self, point: Option<FailurePoint>) {
        *lock(&self.state.fail_at) = point;
    }

    /// Makes the given step sleep for a day before answering.
    pub fn stall_at(&self, point: Option<FailurePoint>) {
        *lock(&self.state.stall_at) = point;
    }

    /// All calls seen so far, in order.
    pub fn events(&self) -> Vec<BrokerEvent> {
        lock(&self.state.events).clone()
    }

    pub fn dial_count(&self) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Dial { .. }))
    }

    pub fn close_count(&self) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Close))
    }

    pub fn published(&self) -> Vec<Publication> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrokerEvent::Publish(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn reset(&self) {
        lock(&self.state.events).clear();
    }

    fn count(&self, pred: impl Fn(&BrokerEvent) -> bool) -> usize {
        lock(&self.state.events).iter().filter(|e| pred(e)).count()
    }
}

#[async_trait]
impl Broker for MockBroker {
    type Connection = MockConnection;

    async fn dial(&self, uri: &str) -> Result<MockConnection, BrokerError> {
        self.state
            .record(BrokerEvent::Dial { uri: uri.to_string() }, FailurePoint::Dial)
            .await?;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl BrokerConnection for MockConnection {
    type Channel = MockChannel;

    async fn open_channel(&self) -> Result<MockChannel, BrokerError> {
        self.state
            .record(BrokerEvent::OpenChannel, FailurePoint::OpenChannel)
            .await?;
        Ok(MockChannel {
            state: Arc::clone(&self.state),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.state.record(BrokerEvent::Close, FailurePoint::Close).await
    }
}

pub struct MockChannel {
    state: Arc<MockState>,
}

#[async_trait]
impl BrokerChannel for MockChannel {
    async fn declare_exchange(&self, exchange: &ExchangeDeclaration) -> Result<(), BrokerError> {
        self.state
            .record(
                BrokerEvent::DeclareExchange(exchange.clone()),
                FailurePoint::DeclareExchange,
            )
            .await
    }

    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<(), BrokerError> {
        self.state
            .record(BrokerEvent::DeclareQueue(queue.clone()), FailurePoint::DeclareQueue)
            .await
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), BrokerError> {
        self.state
            .record(BrokerEvent::BindQueue(binding.clone()), FailurePoint::BindQueue)
            .await
    }

    async fn publish(&self, publication: &Publication) -> Result<(), BrokerError> {
        self.state
            .record(BrokerEvent::Publish(publication.clone()), FailurePoint::Publish)
            .await
    }
}
