// src/rabbitmq/mod.rs
// RabbitMQ publishing over a pluggable broker capability

pub mod broker;
pub mod errors;
pub mod mock;

mod client;
mod lapin_broker;

// Re-export specific items to simplify imports elsewhere
pub use broker::{Broker, BrokerChannel, BrokerConnection, ExchangeType};
pub use client::MqClient;
pub use errors::{ErrorKind, MqError, Result};
pub use lapin_broker::{LapinBroker, LapinChannel, LapinConnection};
