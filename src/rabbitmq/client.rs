// src/rabbitmq/client.rs

use serde::Serialize;
use std::future::Future;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::broker::{
    Broker, BrokerChannel, BrokerConnection, ExchangeDeclaration, ExchangeType, Publication,
    QueueBinding, QueueDeclaration,
};
use super::errors::{ConnectStage, DeclareStage, MqError, Result};
use super::lapin_broker::LapinBroker;
use crate::config::MqConfig;

type ChannelOf<B> = <<B as Broker>::Connection as BrokerConnection>::Channel;

/// Where a single message goes.
struct Route<'a> {
    kind: ExchangeType,
    exchange: &'a str,
    routing_key: &'a str,
    /// Empty means publish without declaring or binding a queue.
    queue: &'a str,
}

/// Publishes single messages to direct or fanout exchanges.
///
/// Every call opens its own connection and channel and closes the connection
/// before returning, so one client can be shared between tasks.
pub struct MqClient<B: Broker = LapinBroker> {
    config: MqConfig,
    broker: B,
}

impl MqClient<LapinBroker> {
    pub fn new(host: &str, port: u16, login: &str, password: &str, vhost: &str) -> Self {
        Self::from_config(MqConfig::new(host, port, login, password, vhost))
    }

    pub fn from_config(config: MqConfig) -> Self {
        Self::with_broker(config, LapinBroker::new())
    }
}

impl<B: Broker> MqClient<B> {
    pub fn with_broker(config: MqConfig, broker: B) -> Self {
        Self { config, broker }
    }

    pub fn config(&self) -> &MqConfig {
        &self.config
    }

    /// Sends `message` through a durable direct exchange, routed by `route_key`.
    ///
    /// A non-empty `queue` is declared durable and bound to the exchange under
    /// `route_key` before publishing.
    #[instrument(level = "debug", skip(self, message))]
    pub async fn direct_msg(
        &self,
        message: &str,
        exchange: &str,
        route_key: &str,
        queue: &str,
    ) -> Result<()> {
        require(message, "message")?;
        require(exchange, "exchange")?;
        require(route_key, "route_key")?;

        let route = Route {
            kind: ExchangeType::Direct,
            exchange,
            routing_key: route_key,
            queue,
        };
        self.send(&route, message.as_bytes()).await
    }

    /// Broadcasts `message` through a durable fanout exchange.
    ///
    /// A non-empty `queue` is declared durable and bound with an empty routing key.
    #[instrument(level = "debug", skip(self, message))]
    pub async fn broadcast_msg(&self, message: &str, exchange: &str, queue: &str) -> Result<()> {
        require(message, "message")?;
        require(exchange, "exchange")?;

        let route = Route {
            kind: ExchangeType::Fanout,
            exchange,
            routing_key: "",
            queue,
        };
        self.send(&route, message.as_bytes()).await
    }

    pub async fn direct_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        exchange: &str,
        route_key: &str,
        queue: &str,
    ) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.direct_msg(&body, exchange, route_key, queue).await
    }

    pub async fn broadcast_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        exchange: &str,
        queue: &str,
    ) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.broadcast_msg(&body, exchange, queue).await
    }

    async fn send(&self, route: &Route<'_>, body: &[u8]) -> Result<()> {
        self.config.validate()?;

        let (connection, channel) = self.connect().await?;
        let outcome = self.declare_and_publish(&channel, route, body).await;
        drop(channel);
        self.release(&connection).await;

        match &outcome {
            Ok(()) => info!(
                exchange = %route.exchange,
                routing_key = %route.routing_key,
                kind = %route.kind,
                "Published message"
            ),
            Err(e) => warn!(exchange = %route.exchange, error = %e, "Publish aborted"),
        }
        outcome
    }

    async fn connect(&self) -> Result<(B::Connection, ChannelOf<B>)> {
        debug!(uri = %self.config.redacted_uri(), "Connecting to RabbitMQ");

        let connection = self
            .bounded(self.broker.dial(&self.config.uri()))
            .await?
            .map_err(|source| MqError::ConnectionError {
                stage: ConnectStage::Dial,
                source,
            })?;

        let channel = match self.bounded(connection.open_channel()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(source)) => {
                self.release(&connection).await;
                return Err(MqError::ConnectionError {
                    stage: ConnectStage::OpenChannel,
                    source,
                });
            }
            Err(elapsed) => {
                self.release(&connection).await;
                return Err(elapsed);
            }
        };

        Ok((connection, channel))
    }

    async fn declare_and_publish(
        &self,
        channel: &ChannelOf<B>,
        route: &Route<'_>,
        body: &[u8],
    ) -> Result<()> {
        channel
            .declare_exchange(&ExchangeDeclaration::durable(route.exchange, route.kind))
            .await
            .map_err(|source| MqError::DeclareError {
                stage: DeclareStage::Exchange,
                source,
            })?;
        debug!(exchange = %route.exchange, kind = %route.kind, "Exchange declared");

        if !route.queue.is_empty() {
            channel
                .declare_queue(&QueueDeclaration::durable(route.queue))
                .await
                .map_err(|source| MqError::DeclareError {
                    stage: DeclareStage::Queue,
                    source,
                })?;

            let binding = QueueBinding {
                queue: route.queue.to_string(),
                exchange: route.exchange.to_string(),
                routing_key: route.routing_key.to_string(),
            };
            channel
                .bind_queue(&binding)
                .await
                .map_err(|source| MqError::DeclareError {
                    stage: DeclareStage::Bind,
                    source,
                })?;
            debug!(queue = %route.queue, exchange = %route.exchange, "Queue bound");
        }

        channel
            .publish(&Publication::new(route.exchange, route.routing_key, body))
            .await
            .map_err(MqError::PublishError)
    }

    /// Closing is best effort: the publish outcome is what the caller gets.
    async fn release(&self, connection: &B::Connection) {
        match connection.close().await {
            Ok(()) => debug!("Connection closed"),
            Err(e) => warn!(error = %e, "Failed to close RabbitMQ connection"),
        }
    }

    async fn bounded<F: Future>(&self, step: F) -> Result<F::Output> {
        match self.config.connect_timeout() {
            Some(limit) => timeout(limit, step)
                .await
                .map_err(|_| MqError::TimeoutError(limit)),
            None => Ok(step.await),
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(MqError::missing(field));
    }
    Ok(())
}
