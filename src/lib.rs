//! Publish single JSON messages to a RabbitMQ direct or fanout exchange.
//!
//! ```no_run
//! # async fn run() -> client_mq::Result<()> {
//! let mq = client_mq::MqClient::new("127.0.0.1", 5672, "username", "password", "vhost");
//! mq.direct_msg(r#"{"id":1}"#, "orders", "created", "orders.created").await?;
//! mq.broadcast_msg(r#"{"id":1}"#, "audit", "").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod env;
pub mod rabbitmq;

pub use config::{MqConfig, TlsConfig};
pub use rabbitmq::{ErrorKind, LapinBroker, MqClient, MqError, Result};
