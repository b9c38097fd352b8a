// Tests against real sockets. The #[ignore]d ones need a running RabbitMQ,
// configured through MQ_HOST / MQ_PORT / MQ_LOGIN / MQ_PASSWORD / MQ_VHOST
// (guest@localhost by default):
//
//     cargo test --test integration -- --ignored

use std::time::Duration;

use futures_lite::StreamExt;
use lapin::{
    options::{
        BasicConsumeOptions, ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions,
        QueueDeleteOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use uuid::Uuid;

use client_mq::{ErrorKind, MqClient, MqConfig};

use crate::init_tracing;

fn live_config() -> MqConfig {
    MqConfig::from_env()
        .unwrap_or_default()
        .with_timeout(Duration::from_secs(5))
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

async fn open_channel(config: &MqConfig) -> (Connection, Channel) {
    let connection = Connection::connect(&config.uri(), ConnectionProperties::default())
        .await
        .expect("Failed to connect to RabbitMQ");
    let channel = connection.create_channel().await.expect("Failed to open channel");
    (connection, channel)
}

async fn next_body(channel: &Channel, queue: &str) -> Vec<u8> {
    let mut consumer = channel
        .basic_consume(
            queue,
            &unique("client-mq-test"),
            BasicConsumeOptions {
                no_ack: true,
                ..BasicConsumeOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .expect("Failed to start consumer");

    let delivery = tokio::time::timeout(Duration::from_secs(5), consumer.next())
        .await
        .expect("No message within 5s")
        .expect("Consumer stream ended")
        .expect("Delivery error");
    delivery.data
}

async fn message_count(channel: &Channel, queue: &str) -> u32 {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                passive: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .expect("Queue should exist")
        .message_count()
}

async fn cleanup(channel: &Channel, exchange: &str, queue: &str) {
    channel
        .queue_delete(queue, QueueDeleteOptions::default())
        .await
        .ok();
    channel
        .exchange_delete(exchange, ExchangeDeleteOptions::default())
        .await
        .ok();
}

#[tokio::test]
async fn test_unreachable_broker_is_a_connection_error() {
    init_tracing();
    let config = MqConfig::new("127.0.0.1", 1, "username", "password", "vhost")
        .with_timeout(Duration::from_secs(5));
    let mq = MqClient::from_config(config);

    for _ in 0..2 {
        let err = mq
            .direct_msg("testData1", "test-test1", "test1", "test1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection, "{}", err);
    }

    let err = mq.broadcast_msg("testData4", "test-test3", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection, "{}", err);
}

#[tokio::test]
#[ignore] // Requires a running RabbitMQ instance
async fn test_direct_msg_delivers_once() {
    init_tracing();
    let config = live_config();
    let exchange = unique("test-test1");
    let queue = unique("test1");

    let mq = MqClient::from_config(config.clone());
    mq.direct_msg("testData1", &exchange, "test1", &queue)
        .await
        .expect("direct_msg failed");

    let (connection, channel) = open_channel(&config).await;
    assert_eq!(message_count(&channel, &queue).await, 1);
    assert_eq!(next_body(&channel, &queue).await, b"testData1".to_vec());
    assert_eq!(message_count(&channel, &queue).await, 0);

    cleanup(&channel, &exchange, &queue).await;
    connection.close(200, "test done").await.ok();
}

#[tokio::test]
#[ignore] // Requires a running RabbitMQ instance
async fn test_broadcast_without_queue_reaches_bound_queues() {
    init_tracing();
    let config = live_config();
    let exchange = unique("test-test3");
    let queue = unique("test3");

    let mq = MqClient::from_config(config.clone());
    // Creates the fanout exchange; nothing is bound yet so this message is dropped.
    mq.broadcast_msg("testData0", &exchange, "")
        .await
        .expect("broadcast_msg failed");

    let (connection, channel) = open_channel(&config).await;
    channel
        .queue_declare(&queue, QueueDeclareOptions::default(), FieldTable::default())
        .await
        .expect("queue declare failed");
    channel
        .queue_bind(&queue, &exchange, "", QueueBindOptions::default(), FieldTable::default())
        .await
        .expect("queue bind failed");

    mq.broadcast_msg("testData4", &exchange, "")
        .await
        .expect("broadcast_msg failed");

    assert_eq!(next_body(&channel, &queue).await, b"testData4".to_vec());

    cleanup(&channel, &exchange, &queue).await;
    connection.close(200, "test done").await.ok();
}
