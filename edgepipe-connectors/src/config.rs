//! MQTT connection settings
//!
//! Settings come from the hosting environment. The edge runtime injects the
//! gateway host and module identity; the token and transport knobs are set
//! in the module's deployment.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `IOTEDGE_GATEWAYHOSTNAME` | broker host | required |
//! | `IOTEDGE_IOTHUBHOSTNAME` | hub name in the username | gateway host |
//! | `IOTEDGE_DEVICEID` | device id | required |
//! | `IOTEDGE_MODULEID` | module id | required |
//! | `EDGEHUB_MQTT_PORT` | broker port | 8883 with TLS, else 1883 |
//! | `EDGEHUB_USE_TLS` | `true`/`false` | `false` |
//! | `EDGEHUB_SAS_TOKEN` | password | none |
//! | `EDGEHUB_KEEP_ALIVE_SECS` | keep-alive | 60 |

use std::time::Duration;

use crate::ConnectorError;

/// Hub protocol version sent in the MQTT username
pub const API_VERSION: &str = "2018-06-30";

/// Plain TCP broker port
pub const DEFAULT_PORT: u16 = 1883;

/// TLS broker port
pub const DEFAULT_TLS_PORT: u16 = 8883;

const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// MQTT configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Hub host name used to build the username
    pub hub_hostname: String,
    /// Device the module runs on
    pub device_id: String,
    /// Module identity
    pub module_id: String,
    /// Pre-signed token sent as password
    pub sas_token: Option<String>,
    /// Wrap the TCP stream in TLS
    pub use_tls: bool,
    /// MQTT keep-alive
    pub keep_alive: Duration,
    /// Time allowed for the initial CONNACK
    pub connect_timeout: Duration,
    /// Capacity of the client request channel
    pub channel_capacity: usize,
}

impl MqttConfig {
    /// Create configuration for a module on a plain TCP broker
    pub fn new(
        host: impl Into<String>,
        device_id: impl Into<String>,
        module_id: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            hub_hostname: host.clone(),
            host,
            port: DEFAULT_PORT,
            device_id: device_id.into(),
            module_id: module_id.into(),
            sas_token: None,
            use_tls: false,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConnectorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConnectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConnectorError::ConfigError(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required("IOTEDGE_GATEWAYHOSTNAME")?,
            required("IOTEDGE_DEVICEID")?,
            required("IOTEDGE_MODULEID")?,
        );

        if let Some(hub) = lookup("IOTEDGE_IOTHUBHOSTNAME").filter(|v| !v.is_empty()) {
            config.hub_hostname = hub;
        }

        if let Some(tls) = lookup("EDGEHUB_USE_TLS") {
            config = config.tls(parse_bool("EDGEHUB_USE_TLS", &tls)?);
        }

        if let Some(port) = lookup("EDGEHUB_MQTT_PORT") {
            config.port = port.parse().map_err(|_| {
                ConnectorError::ConfigError(format!("EDGEHUB_MQTT_PORT is not a port: {port}"))
            })?;
        }

        if let Some(secs) = lookup("EDGEHUB_KEEP_ALIVE_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ConnectorError::ConfigError(format!("EDGEHUB_KEEP_ALIVE_SECS is not a number: {secs}"))
            })?;
            config = config.keep_alive_secs(secs);
        }

        config.sas_token = lookup("EDGEHUB_SAS_TOKEN").filter(|v| !v.is_empty());

        Ok(config)
    }

    /// Set broker port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set hub host name
    pub fn hub_hostname(mut self, hub: impl Into<String>) -> Self {
        self.hub_hostname = hub.into();
        self
    }

    /// Set password token
    pub fn sas_token(mut self, token: impl Into<String>) -> Self {
        self.sas_token = Some(token.into());
        self
    }

    /// Enable or disable TLS, moving the port to the matching default
    pub fn tls(mut self, enabled: bool) -> Self {
        if self.port == DEFAULT_PORT || self.port == DEFAULT_TLS_PORT {
            self.port = if enabled { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
        }
        self.use_tls = enabled;
        self
    }

    /// Set keep-alive in seconds (MQTT requires at least 5)
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive = Duration::from_secs(secs.max(5));
        self
    }

    /// Set CONNACK timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// MQTT client id: `{device}/{module}`
    pub fn client_id(&self) -> String {
        format!("{}/{}", self.device_id, self.module_id)
    }

    /// MQTT username: `{hub}/{device}/{module}/?api-version=...`
    pub fn username(&self) -> String {
        format!(
            "{}/{}/{}/?api-version={}",
            self.hub_hostname, self.device_id, self.module_id, API_VERSION
        )
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConnectorError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConnectorError::ConfigError(format!(
            "{key} is not a boolean: {value}"
        ))),
    }
}
