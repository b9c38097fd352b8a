// src/rabbitmq/errors.rs

use serde_json::Error as SerdeError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the underlying broker library.
pub type BrokerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which part of the connect step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    Dial,
    OpenChannel,
}

impl fmt::Display for ConnectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectStage::Dial => f.write_str("dial"),
            ConnectStage::OpenChannel => f.write_str("open channel"),
        }
    }
}

/// Which declaration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareStage {
    Exchange,
    Queue,
    Bind,
}

impl fmt::Display for DeclareStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclareStage::Exchange => f.write_str("exchange declare"),
            DeclareStage::Queue => f.write_str("queue declare"),
            DeclareStage::Bind => f.write_str("queue bind"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MqError {
    #[error("illegal parameter: {0}")]
    InvalidArgument(String),

    #[error("RabbitMQ connection error ({stage}): {source}")]
    ConnectionError {
        stage: ConnectStage,
        #[source]
        source: BrokerError,
    },

    #[error("Connection timeout: broker did not answer within {0:?}")]
    TimeoutError(Duration),

    #[error("RabbitMQ declare error ({stage}): {source}")]
    DeclareError {
        stage: DeclareStage,
        #[source]
        source: BrokerError,
    },

    #[error("RabbitMQ publish error: {0}")]
    PublishError(#[source] BrokerError),

    #[error("Message serialization error: {0}")]
    SerializationError(#[from] SerdeError),

    #[error("unsupported configuration: {0}")]
    Unsupported(String),
}

/// Coarse classification of an [`MqError`], one per failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Connection,
    Declare,
    Publish,
    Serialization,
}

impl MqError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MqError::InvalidArgument(_) | MqError::Unsupported(_) => ErrorKind::InvalidArgument,
            MqError::ConnectionError { .. } | MqError::TimeoutError(_) => ErrorKind::Connection,
            MqError::DeclareError { .. } => ErrorKind::Declare,
            MqError::PublishError(_) => ErrorKind::Publish,
            MqError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        MqError::InvalidArgument(format!("{} must not be empty", field))
    }
}

// Custom Result type for client operations
pub type Result<T> = std::result::Result<T, MqError>;
