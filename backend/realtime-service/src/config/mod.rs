use cad_push_shared::PushConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::websocket::HeartbeatConfig;

/// Service configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub app_host: String,
    #[serde(default = "default_port")]
    pub app_port: u16,

    #[serde(default = "default_push_gateway_url")]
    pub push_gateway_url: String,
    #[serde(default = "default_push_batch_size")]
    pub push_batch_size: usize,
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,

    /// Optional deadline for a single live-channel write; unset means unbounded
    #[serde(default)]
    pub peer_send_timeout_ms: Option<u64>,
    /// Outbound frames queued per live connection before writes start waiting
    #[serde(default = "default_peer_buffer")]
    pub peer_buffer: usize,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_push_gateway_url() -> String {
    cad_push_shared::client::DEFAULT_GATEWAY_URL.to_string()
}

fn default_push_batch_size() -> usize {
    cad_push_shared::client::DEFAULT_BATCH_SIZE
}

fn default_push_timeout_secs() -> u64 {
    15
}

fn default_peer_buffer() -> usize {
    64
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_client_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.push_batch_size == 0 {
            return Err(AppError::Config("PUSH_BATCH_SIZE must be positive".into()));
        }
        if self.push_timeout_secs == 0 {
            return Err(AppError::Config("PUSH_TIMEOUT_SECS must be positive".into()));
        }
        if self.peer_buffer == 0 {
            return Err(AppError::Config("PEER_BUFFER must be positive".into()));
        }
        if self.heartbeat_interval_secs == 0 || self.client_timeout_secs <= self.heartbeat_interval_secs {
            return Err(AppError::Config(
                "CLIENT_TIMEOUT_SECS must exceed a positive HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }

    pub fn push(&self) -> PushConfig {
        PushConfig {
            endpoint: self.push_gateway_url.clone(),
            batch_size: self.push_batch_size,
            timeout: Duration::from_secs(self.push_timeout_secs),
        }
    }

    pub fn peer_send_timeout(&self) -> Option<Duration> {
        self.peer_send_timeout_ms.map(Duration::from_millis)
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(self.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
        }
    }
}
