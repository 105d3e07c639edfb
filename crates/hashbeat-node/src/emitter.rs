//! Heartbeat emission
//!
//! Heartbeat `i` carries payload `<id>|<unix time>|<i>` and reveals chain value
//! `v_{N-i}`. Each value is revealed at most once; after `N` heartbeats the
//! node must generate a fresh chain and register again.

use chrono::Utc;
use hashbeat_core::{encode_heartbeat, HashChain, HeartbeatPayload};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};

/// Walks a hash chain backwards, one datagram per heartbeat
#[derive(Debug)]
pub struct HeartbeatEmitter {
    client_id: String,
    chain: HashChain,
    socket: UdpSocket,
    target: SocketAddr,
    next: usize,
}

impl HeartbeatEmitter {
    /// Bind an ephemeral socket for sending to `target`
    pub async fn bind(client_id: impl Into<String>, chain: HashChain, target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;

        Ok(Self {
            client_id: client_id.into(),
            chain,
            socket,
            target,
            next: 1,
        })
    }

    /// Counter of the next heartbeat
    pub fn next_counter(&self) -> usize {
        self.next
    }

    /// Heartbeats left before the chain is exhausted
    pub fn remaining(&self) -> usize {
        (self.chain.length() + 1).saturating_sub(self.next)
    }

    /// Build heartbeat `counter` with the current wall-clock time
    pub fn datagram(&self, counter: usize) -> Result<Vec<u8>> {
        let w_i = self
            .chain
            .reveal(counter)
            .ok_or(NodeError::ChainExhausted(self.chain.length()))?;

        let now = Utc::now();
        let timestamp = format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros());
        let payload = HeartbeatPayload::new(self.client_id.as_str(), timestamp, counter as u64);

        Ok(encode_heartbeat(self.chain.algorithm(), &payload, w_i))
    }

    /// Send the next heartbeat and return its counter
    pub async fn send_next(&mut self) -> Result<usize> {
        let counter = self.next;
        let datagram = self.datagram(counter)?;
        self.socket.send_to(&datagram, self.target).await?;
        self.next += 1;

        debug!(client_id = %self.client_id, counter, "Heartbeat sent");
        Ok(counter)
    }

    /// Burn the next chain value without sending it
    pub fn skip(&mut self) -> Result<usize> {
        if self.remaining() == 0 {
            return Err(NodeError::ChainExhausted(self.chain.length()));
        }
        let counter = self.next;
        self.next += 1;
        Ok(counter)
    }

    /// Send one heartbeat per `interval` until the chain runs out or
    /// `shutdown` fires; returns how many were sent
    pub async fn run(&mut self, interval: Duration, shutdown: CancellationToken) -> Result<usize> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0;

        info!(
            client_id = %self.client_id,
            target = %self.target,
            remaining = self.remaining(),
            "Heartbeat emitter started"
        );

        while self.remaining() > 0 {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.send_next().await {
                        Ok(_) => sent += 1,
                        // A failed send still burns the value; the access point
                        // will resynchronize on the next one
                        Err(NodeError::Io(e)) => {
                            warn!(client_id = %self.client_id, error = %e, "Heartbeat send failed");
                            self.next += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        if self.remaining() == 0 {
            warn!(client_id = %self.client_id, sent, "Hash chain exhausted, re-registration required");
        }
        Ok(sent)
    }
}
