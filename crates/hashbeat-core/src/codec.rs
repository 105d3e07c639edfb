//! Wire encoding for registration, heartbeat and dead-node messages
//!
//! Heartbeat datagram layout:
//!
//! ```text
//! <client_id> "|" <timestamp> "|" <counter> "||" <w_i: 32 bytes> "||" <authenticator: 32 bytes>
//! ```
//!
//! `w_i` and the authenticator are raw digests and may contain `|` bytes, so
//! they are located by width from the end of the datagram rather than by
//! searching for delimiters.

use crate::error::{HashbeatError, Result};
use crate::hash::{ChainValue, HashAlgorithm, DIGEST_LEN};

/// Separator between payload fields
pub const FIELD_DELIMITER: u8 = b'|';

/// Separator between payload, chain value and authenticator
pub const SECTION_DELIMITER: &[u8] = b"||";

/// Acknowledgment token returned after a successful registration
pub const ACK: &[u8] = b"ACK";

/// Prefix of a dead-node notification
pub const DEAD_NODE_PREFIX: &str = "NODE_DEAD|";

/// Longest accepted client id, in bytes
pub const MAX_CLIENT_ID_LEN: usize = 256;

const TAIL_LEN: usize = SECTION_DELIMITER.len() * 2 + DIGEST_LEN * 2;

/// Parsed heartbeat payload: `client_id|timestamp|counter`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPayload {
    /// Sending node's identity
    pub client_id: String,
    /// Sender clock reading, carried as text
    pub timestamp: String,
    /// Heartbeat sequence number
    pub counter: u64,
}

impl HeartbeatPayload {
    /// Create a payload
    pub fn new(client_id: impl Into<String>, timestamp: impl Into<String>, counter: u64) -> Self {
        Self {
            client_id: client_id.into(),
            timestamp: timestamp.into(),
            counter,
        }
    }

    /// Text form used on the wire and as authenticator input
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}|{}|{}", self.client_id, self.timestamp, self.counter).into_bytes()
    }

    /// Parse the text form, requiring exactly three `|`-separated fields
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| HashbeatError::MalformedMessage("payload is not UTF-8".into()))?;

        let fields: Vec<&str> = text.split(FIELD_DELIMITER as char).collect();
        if fields.len() != 3 {
            return Err(HashbeatError::MalformedMessage(format!(
                "payload has {} fields, expected 3",
                fields.len()
            )));
        }

        validate_client_id(fields[0])?;
        if fields[1].is_empty() {
            return Err(HashbeatError::MalformedMessage("empty timestamp".into()));
        }
        let counter = fields[2].parse::<u64>().map_err(|_| {
            HashbeatError::MalformedMessage(format!("counter '{}' is not a number", fields[2]))
        })?;

        Ok(Self::new(fields[0], fields[1], counter))
    }
}

/// A received heartbeat, split into its three sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatMessage {
    /// Payload bytes exactly as received (authenticator input)
    pub payload_bytes: Vec<u8>,
    /// Parsed payload fields
    pub payload: HeartbeatPayload,
    /// Revealed chain value
    pub w_i: ChainValue,
    /// Claimed H(payload || w_i)
    pub authenticator: ChainValue,
}

impl HeartbeatMessage {
    /// Client id named by the payload
    pub fn client_id(&self) -> &str {
        &self.payload.client_id
    }

    /// Whether the authenticator matches the payload and chain value
    pub fn authenticator_valid(&self, algorithm: HashAlgorithm) -> bool {
        compute_authenticator(algorithm, &self.payload_bytes, &self.w_i) == self.authenticator
    }
}

/// H(payload || w_i)
pub fn compute_authenticator(
    algorithm: HashAlgorithm,
    payload: &[u8],
    w_i: &ChainValue,
) -> ChainValue {
    algorithm.hash_parts(&[payload, w_i.as_bytes()])
}

/// Build a heartbeat datagram
pub fn encode_heartbeat(
    algorithm: HashAlgorithm,
    payload: &HeartbeatPayload,
    w_i: &ChainValue,
) -> Vec<u8> {
    let payload_bytes = payload.to_bytes();
    let authenticator = compute_authenticator(algorithm, &payload_bytes, w_i);

    let mut out = Vec::with_capacity(payload_bytes.len() + TAIL_LEN);
    out.extend_from_slice(&payload_bytes);
    out.extend_from_slice(SECTION_DELIMITER);
    out.extend_from_slice(w_i.as_bytes());
    out.extend_from_slice(SECTION_DELIMITER);
    out.extend_from_slice(authenticator.as_bytes());
    out
}

/// Split a heartbeat datagram into payload, chain value and authenticator
pub fn decode_heartbeat(bytes: &[u8]) -> Result<HeartbeatMessage> {
    if bytes.len() <= TAIL_LEN {
        return Err(HashbeatError::MalformedMessage(format!(
            "heartbeat of {} bytes is too short",
            bytes.len()
        )));
    }

    let auth_start = bytes.len() - DIGEST_LEN;
    let second_delim = auth_start - SECTION_DELIMITER.len();
    let w_start = second_delim - DIGEST_LEN;
    let first_delim = w_start - SECTION_DELIMITER.len();

    if &bytes[second_delim..auth_start] != SECTION_DELIMITER
        || &bytes[first_delim..w_start] != SECTION_DELIMITER
    {
        return Err(HashbeatError::MalformedMessage(
            "heartbeat sections are not delimited by '||'".into(),
        ));
    }

    let payload_bytes = &bytes[..first_delim];
    let payload = HeartbeatPayload::parse(payload_bytes)?;

    Ok(HeartbeatMessage {
        payload_bytes: payload_bytes.to_vec(),
        payload,
        w_i: ChainValue::from_slice(&bytes[w_start..second_delim])?,
        authenticator: ChainValue::from_slice(&bytes[auth_start..])?,
    })
}

/// Registration request: `<client_id>|<public_key_hex>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// Registering node's identity
    pub client_id: String,
    /// Terminal value of the node's chain
    pub public_key: ChainValue,
}

impl RegistrationRequest {
    /// Create a request
    pub fn new(client_id: impl Into<String>, public_key: ChainValue) -> Self {
        Self {
            client_id: client_id.into(),
            public_key,
        }
    }

    /// Wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}|{}", self.client_id, self.public_key.to_hex()).into_bytes()
    }

    /// Parse the wire form; the id ends at the first `|`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| HashbeatError::MalformedMessage("registration is not UTF-8".into()))?;

        let (client_id, key_hex) = text
            .trim_end()
            .split_once(FIELD_DELIMITER as char)
            .ok_or_else(|| {
                HashbeatError::MalformedMessage("registration is missing '|' separator".into())
            })?;

        validate_client_id(client_id)?;
        let public_key = ChainValue::from_hex(key_hex)?;

        Ok(Self::new(client_id, public_key))
    }
}

/// Build a dead-node notification: `NODE_DEAD|<client_id>`
pub fn encode_dead_node(client_id: &str) -> Vec<u8> {
    format!("{}{}", DEAD_NODE_PREFIX, client_id).into_bytes()
}

/// Extract the client id from a dead-node notification
pub fn decode_dead_node(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| HashbeatError::MalformedMessage("notification is not UTF-8".into()))?;
    let client_id = text.strip_prefix(DEAD_NODE_PREFIX).ok_or_else(|| {
        HashbeatError::MalformedMessage("notification lacks NODE_DEAD prefix".into())
    })?;
    validate_client_id(client_id)?;
    Ok(client_id.to_string())
}

fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.is_empty() {
        return Err(HashbeatError::MalformedMessage("empty client id".into()));
    }
    if client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(HashbeatError::MalformedMessage(format!(
            "client id too long ({} bytes, max {})",
            client_id.len(),
            MAX_CLIENT_ID_LEN
        )));
    }
    Ok(())
}
