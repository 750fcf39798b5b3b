//! Hub Connections for EdgePipe Modules
//!
//! ## Overview
//!
//! This crate provides the [`Connection`](edgepipe_core::Connection)
//! implementations the module runs on. The only transport is MQTT over TCP,
//! the way an edge module talks to its local hub.
//!
//! ## MQTT
//!
//! **Session:**
//! - Client id `{device}/{module}`
//! - Username `{hub}/{device}/{module}/?api-version=2018-06-30`
//! - Password: a pre-signed token from the environment, if any
//! - Optional TLS (rustls with the platform's root certificates)
//!
//! **Routing:**
//! - Events are published to `devices/{d}/modules/{m}/messages/events/{bag}`
//! - Output channels are selected with the `$.on` property in the bag
//! - Inputs arrive on `devices/{d}/modules/{m}/inputs/{input}/{bag}`
//!
//! **Dispatch:**
//! Each inbound message is handed to its input's handler on a fresh tokio
//! task, so handlers for different messages may run at the same time. A
//! handler error is reported on the connection's fault channel; the module
//! treats it as fatal.
//!
//! **Reconnection:**
//! The event loop keeps polling after transport errors, which makes
//! `rumqttc` reconnect. Inputs are re-subscribed when the broker did not keep
//! the session.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use edgepipe_connectors::{MqttConfig, MqttConnection};
//! use edgepipe_core::{Connection, Message};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MqttConfig::from_env()?;
//! let connection = Arc::new(MqttConnection::new(config));
//! connection.open().await?;
//!
//! connection.send_event(Message::new(r#"{"Temperature":21.5,"Humidity":40.0}"#)).await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mqtt;
pub mod topic;

// Re-export common types
pub use config::MqttConfig;
pub use mqtt::MqttConnection;
pub use rumqttc::QoS;
pub use topic::ModuleTopics;

use edgepipe_core::RelayError;
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ConnectorError> for RelayError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotConnected => RelayError::NotConnected,
            other => RelayError::Setup(other.to_string()),
        }
    }
}

/// Connection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total inbound messages dispatched to handlers
    pub messages_received: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Number of reconnections
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_errors_map_to_relay_errors() {
        assert!(matches!(
            RelayError::from(ConnectorError::NotConnected),
            RelayError::NotConnected
        ));
        match RelayError::from(ConnectorError::ConfigError("IOTEDGE_DEVICEID is not set".into())) {
            RelayError::Setup(msg) => assert!(msg.contains("IOTEDGE_DEVICEID")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
