// src/rabbitmq/lapin_broker.rs
// Broker capability backed by lapin.

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::debug;

use super::broker::{
    Broker, BrokerChannel, BrokerConnection, ExchangeDeclaration, ExchangeType, Publication,
    QueueBinding, QueueDeclaration,
};
use super::errors::BrokerError;

const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Clone)]
pub struct LapinBroker {
    connection_name: String,
}

impl LapinBroker {
    pub fn new() -> Self {
        Self {
            connection_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    /// Name reported to the broker in the connection properties.
    pub fn with_connection_name(mut self, name: &str) -> Self {
        self.connection_name = name.to_string();
        self
    }

    fn connection_properties(&self) -> ConnectionProperties {
        ConnectionProperties::default().with_connection_name(self.connection_name.clone().into())
    }
}

impl Default for LapinBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for LapinBroker {
    type Connection = LapinConnection;

    async fn dial(&self, uri: &str) -> Result<LapinConnection, BrokerError> {
        let connection = Connection::connect(uri, self.connection_properties()).await?;
        Ok(LapinConnection { connection })
    }
}

pub struct LapinConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for LapinConnection {
    type Channel = LapinChannel;

    async fn open_channel(&self) -> Result<LapinChannel, BrokerError> {
        let channel = self.connection.create_channel().await?;
        debug!(channel_id = channel.id(), "Opened channel");
        Ok(LapinChannel { channel })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.connection.status().connected() {
            debug!("Connection already closed by the broker");
            return Ok(());
        }
        self.connection.close(REPLY_SUCCESS, "Closing connection").await?;
        Ok(())
    }
}

pub struct LapinChannel {
    channel: Channel,
}

fn exchange_kind(kind: ExchangeType) -> ExchangeKind {
    match kind {
        ExchangeType::Direct => ExchangeKind::Direct,
        ExchangeType::Fanout => ExchangeKind::Fanout,
    }
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn declare_exchange(&self, exchange: &ExchangeDeclaration) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(
                &exchange.name,
                exchange_kind(exchange.kind),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: exchange.durable,
                    auto_delete: exchange.auto_delete,
                    internal: exchange.internal,
                    nowait: !exchange.wait,
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn declare_queue(&self, queue: &QueueDeclaration) -> Result<(), BrokerError> {
        let declared = self
            .channel
            .queue_declare(
                &queue.name,
                QueueDeclareOptions {
                    passive: false,
                    durable: queue.durable,
                    exclusive: queue.exclusive,
                    auto_delete: queue.auto_delete,
                    nowait: !queue.wait,
                },
                FieldTable::default(),
            )
            .await?;
        debug!(
            queue = %queue.name,
            messages = declared.message_count(),
            consumers = declared.consumer_count(),
            "Queue declared"
        );
        Ok(())
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), BrokerError> {
        self.channel
            .queue_bind(
                &binding.queue,
                &binding.exchange,
                &binding.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish(&self, publication: &Publication) -> Result<(), BrokerError> {
        let properties = BasicProperties::default()
            .with_headers(FieldTable::default())
            .with_content_type(publication.properties.content_type.as_str().into())
            .with_delivery_mode(publication.properties.delivery_mode)
            .with_priority(publication.properties.priority);

        // Without confirm mode the returned confirmation resolves to NotRequested
        // once the frames have been handed to the connection.
        self.channel
            .basic_publish(
                &publication.exchange,
                &publication.routing_key,
                BasicPublishOptions {
                    mandatory: publication.mandatory,
                    immediate: publication.immediate,
                },
                &publication.body,
                properties,
            )
            .await?
            .await?;
        Ok(())
    }
}
