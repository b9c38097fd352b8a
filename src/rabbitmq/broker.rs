// src/rabbitmq/broker.rs
// Capability seam between the publish sequence and the AMQP library.

use async_trait::async_trait;
use std::fmt;

use super::errors::BrokerError;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode 2: the broker writes the message to disk.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    Direct,
    Fanout,
}

impl ExchangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Fanout => "fanout",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDeclaration {
    pub name: String,
    pub kind: ExchangeType,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    /// Wait for declare-ok from the broker.
    pub wait: bool,
}

impl ExchangeDeclaration {
    pub fn durable(name: &str, kind: ExchangeType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            durable: true,
            auto_delete: false,
            internal: false,
            wait: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeclaration {
    pub name: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
    pub wait: bool,
}

impl QueueDeclaration {
    pub fn durable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            durable: true,
            auto_delete: false,
            exclusive: false,
            wait: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: String,
    pub delivery_mode: u8,
    pub priority: u8,
}

impl Default for MessageProperties {
    fn default() -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            delivery_mode: PERSISTENT_DELIVERY_MODE,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
    pub mandatory: bool,
    pub immediate: bool,
}

impl Publication {
    /// Persistent JSON publication; unroutable messages are dropped by the broker.
    pub fn new(exchange: &str, routing_key: &str, body: &[u8]) -> Self {
        Self {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
            properties: MessageProperties::default(),
            mandatory: false,
            immediate: false,
        }
    }
}

/// Something that can open connections to a broker.
///
/// Enables running the publish sequence against a fake broker in tests.
#[async_trait]
pub trait Broker: Send + Sync {
    type Connection: BrokerConnection;

    async fn dial(&self, uri: &str) -> Result<Self::Connection, BrokerError>;
}

#[async_trait]
pub trait BrokerConnection: Send + Sync {
    type Channel: BrokerChannel;

    async fn open_channel(&self) -> Result<Self::Channel, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait BrokerChannel: Send + Sync {
    async fn declare_exchange(&self, exchange: &ExchangeDeclaration) -> Result<(), BrokerError>;

    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<(), BrokerError>;

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), BrokerError>;

    async fn publish(&self, publication: &Publication) -> Result<(), BrokerError>;
}
