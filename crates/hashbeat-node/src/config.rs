//! Node configuration

use hashbeat_core::HashAlgorithm;
use rand::rngs::OsRng;
use rand::RngCore;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NodeError, Result};

/// Runtime configuration for a heartbeat-sending node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Identity announced to the access point
    pub client_id: String,
    /// Access point address
    pub access_point: IpAddr,
    pub registration_port: u16,
    pub heartbeat_port: u16,
    /// Heartbeats per chain
    pub chain_length: usize,
    pub heartbeat_interval: Duration,
    pub hash_algorithm: HashAlgorithm,
    /// Where each generated chain is written, if anywhere
    pub chain_file: Option<PathBuf>,
    /// Where each chain's public key is written, if anywhere
    pub public_key_file: Option<PathBuf>,
    /// Bound on one registration exchange
    pub registration_timeout: Duration,
    /// Registration attempts before giving up
    pub registration_attempts: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            client_id: random_client_id(),
            access_point: IpAddr::V4(Ipv4Addr::LOCALHOST),
            registration_port: 5000,
            heartbeat_port: 5001,
            chain_length: 10,
            heartbeat_interval: Duration::from_secs(1),
            hash_algorithm: HashAlgorithm::Sha256,
            chain_file: None,
            public_key_file: None,
            registration_timeout: Duration::from_secs(5),
            registration_attempts: 5,
        }
    }
}

/// `node-` followed by 8 random hex digits
pub fn random_client_id() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    format!("node-{}", hex::encode(bytes))
}

impl NodeConfig {
    /// Defaults overridden by `HASHBEAT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HASHBEAT_NODE_ID") {
            config.client_id = v.trim().to_string();
        }
        if let Some(v) = get("HASHBEAT_AP_ADDR") {
            config.access_point = parse("HASHBEAT_AP_ADDR", &v)?;
        }
        if let Some(v) = get("HASHBEAT_REGISTRATION_PORT") {
            config.registration_port = parse("HASHBEAT_REGISTRATION_PORT", &v)?;
        }
        if let Some(v) = get("HASHBEAT_HEARTBEAT_PORT") {
            config.heartbeat_port = parse("HASHBEAT_HEARTBEAT_PORT", &v)?;
        }
        if let Some(v) = get("HASHBEAT_CHAIN_LENGTH") {
            config.chain_length = parse("HASHBEAT_CHAIN_LENGTH", &v)?;
        }
        if let Some(v) = get("HASHBEAT_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval = Duration::from_millis(parse("HASHBEAT_HEARTBEAT_INTERVAL_MS", &v)?);
        }
        if let Some(v) = get("HASHBEAT_HASH_ALGORITHM") {
            config.hash_algorithm = parse("HASHBEAT_HASH_ALGORITHM", &v)?;
        }
        config.chain_file = get("HASHBEAT_CHAIN_FILE").map(PathBuf::from);
        config.public_key_file = get("HASHBEAT_PUBLIC_KEY_FILE").map(PathBuf::from);

        if config.chain_length == 0 {
            return Err(NodeError::Config("HASHBEAT_CHAIN_LENGTH must be at least 1".into()));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(NodeError::Config("HASHBEAT_HEARTBEAT_INTERVAL_MS must be greater than zero".into()));
        }

        Ok(config)
    }

    pub fn registration_addr(&self) -> SocketAddr {
        SocketAddr::new(self.access_point, self.registration_port)
    }

    pub fn heartbeat_addr(&self) -> SocketAddr {
        SocketAddr::new(self.access_point, self.heartbeat_port)
    }
}

fn parse<T>(var: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| NodeError::Config(format!("{} has invalid value '{}': {}", var, value, e)))
}
