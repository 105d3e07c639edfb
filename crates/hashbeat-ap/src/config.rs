//! Access point configuration
//!
//! Every setting has a default; `from_env` overrides them from `HASHBEAT_*`
//! environment variables. Durations are given in milliseconds.

use hashbeat_core::HashAlgorithm;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Invalid configuration value
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for [`AccessPointService`](crate::AccessPointService)
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPointConfig {
    /// Interface every listener binds to
    pub bind_addr: IpAddr,
    /// TCP port for key registration
    pub registration_port: u16,
    /// UDP port for heartbeats
    pub heartbeat_port: u16,
    /// TCP port for the status API; disabled when `None`
    pub status_port: Option<u16>,
    /// Idle time after which a client is declared dead
    pub liveness_timeout: Duration,
    /// How often the liveness monitor sweeps
    pub sweep_interval: Duration,
    /// Hash function shared with the nodes
    pub hash_algorithm: HashAlgorithm,
    /// Postgres connection string for the key store
    pub database_url: Option<String>,
    /// Where dead-node notifications are sent
    pub coordinator_addr: Option<SocketAddr>,
    /// Re-seed unknown clients from the key store
    pub restore_from_store: bool,
    /// Bound on waiting for a registration request
    pub registration_read_timeout: Duration,
    /// Time in-flight registrations get to finish on shutdown
    pub shutdown_grace: Duration,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            registration_port: 5000,
            heartbeat_port: 5001,
            status_port: None,
            liveness_timeout: Duration::from_secs(7),
            sweep_interval: Duration::from_secs(1),
            hash_algorithm: HashAlgorithm::Sha256,
            database_url: None,
            coordinator_addr: None,
            restore_from_store: true,
            registration_read_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl AccessPointConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HASHBEAT_BIND_ADDR") {
            config.bind_addr = parse("HASHBEAT_BIND_ADDR", &v)?;
        }
        if let Some(v) = get("HASHBEAT_REGISTRATION_PORT") {
            config.registration_port = parse("HASHBEAT_REGISTRATION_PORT", &v)?;
        }
        if let Some(v) = get("HASHBEAT_HEARTBEAT_PORT") {
            config.heartbeat_port = parse("HASHBEAT_HEARTBEAT_PORT", &v)?;
        }
        if let Some(v) = get("HASHBEAT_STATUS_PORT") {
            config.status_port = Some(parse("HASHBEAT_STATUS_PORT", &v)?);
        }
        if let Some(v) = get("HASHBEAT_LIVENESS_TIMEOUT_MS") {
            config.liveness_timeout = millis("HASHBEAT_LIVENESS_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("HASHBEAT_SWEEP_INTERVAL_MS") {
            config.sweep_interval = millis("HASHBEAT_SWEEP_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("HASHBEAT_HASH_ALGORITHM") {
            config.hash_algorithm = parse("HASHBEAT_HASH_ALGORITHM", &v)?;
        }
        config.database_url = get("HASHBEAT_DATABASE_URL");
        if let Some(v) = get("HASHBEAT_COORDINATOR_ADDR") {
            config.coordinator_addr = Some(parse("HASHBEAT_COORDINATOR_ADDR", &v)?);
        }
        if let Some(v) = get("HASHBEAT_RESTORE_FROM_STORE") {
            config.restore_from_store = parse("HASHBEAT_RESTORE_FROM_STORE", &v)?;
        }
        if let Some(v) = get("HASHBEAT_REGISTRATION_TIMEOUT_MS") {
            config.registration_read_timeout = millis("HASHBEAT_REGISTRATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("HASHBEAT_SHUTDOWN_GRACE_MS") {
            config.shutdown_grace = Duration::from_millis(parse("HASHBEAT_SHUTDOWN_GRACE_MS", &v)?);
        }

        Ok(config)
    }

    pub fn registration_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.registration_port)
    }

    pub fn heartbeat_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.heartbeat_port)
    }

    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status_port.map(|port| SocketAddr::new(self.bind_addr, port))
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Positive millisecond duration
fn millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let ms: u64 = parse(var, value)?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}
