//! The pending-query correlation table (§3, §4.2).
//!
//! Every query forwarded to the resolver is assigned a fresh, cryptographically
//! random 64-bit id; the resolver's eventual `ANSWER` message carries that id
//! back, and this table maps it to everything needed to re-encode and route
//! the reply to the right client. Grounded on the teacher's
//! `protocol/connection_manager.rs::ConnectionManager<T>`, which uses the same
//! `DashMap<u64, _>` shape for a different kind of per-flow state.
//!
//! Invariants enforced here:
//! - I1: an id is never handed to the resolver twice while still pending.
//! - I2: every entry is removable exactly once — a second `remove` for the
//!   same id is a no-op, so a duplicate/late resolver answer can't resurrect
//!   state for a query that already completed.
//! - I3: entries older than the configured timeout are reclaimed by `sweep`
//!   even if the resolver never answers.
//! - I4: table size is bounded; `insert` fails with `TableFull` instead of
//!   growing unboundedly when the resolver is wedged.
//! - I5: UDP entries carry the client's socket address, TCP entries carry
//!   only the owning connection's id — the session layer owns the actual
//!   socket.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::RngCore;

use crate::dns::{EdnsInfo, Question};
use crate::error::{FrontendError, Result};

#[derive(Clone, Debug)]
pub enum Transport {
    Udp { peer: SocketAddr },
    Tcp { conn_id: u64 },
}

#[derive(Clone, Debug)]
pub struct PendingQuery {
    pub question: Question,
    pub client_id: u16,
    pub rd: bool,
    /// The client's CD (Checking Disabled) bit. A bogus answer is passed
    /// through instead of rewritten to SERVFAIL when this is set (§4.5).
    pub cd: bool,
    pub edns: EdnsInfo,
    pub transport: Transport,
    pub submitted_at: Instant,
}

pub struct PendingTable {
    entries: DashMap<u64, PendingQuery>,
    capacity: usize,
}

impl PendingTable {
    pub fn new(capacity: usize) -> Self {
        PendingTable {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Reserve a fresh random id and insert `query` under it. Retries on the
    /// astronomically unlikely collision with a still-pending id (I1).
    pub fn insert(&self, query: PendingQuery) -> Result<u64> {
        if self.entries.len() >= self.capacity {
            return Err(FrontendError::TableFull);
        }
        let mut rng = rand::rng();
        for _ in 0..8 {
            let id = rng.next_u64();
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.entries.entry(id) {
                slot.insert(query);
                return Ok(id);
            }
        }
        Err(FrontendError::TableFull)
    }

    /// Remove and return the entry for `id`, if it is still pending (I2).
    pub fn remove(&self, id: u64) -> Option<PendingQuery> {
        self.entries.remove(&id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop and return every entry older than `timeout` (I3). Intended to be
    /// called periodically from the event loop.
    pub fn sweep_expired(&self, timeout: Duration) -> Vec<(u64, PendingQuery)> {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|entry| now.duration_since(entry.value().submitted_at) >= timeout)
            .map(|entry| *entry.key())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|(k, v)| (k, v)))
            .collect()
    }

    /// Drop every entry belonging to the given TCP connection, e.g. when it
    /// closes or times out while queries are still outstanding.
    pub fn remove_for_connection(&self, conn_id: u64) -> Vec<(u64, PendingQuery)> {
        let victims: Vec<u64> = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.value().transport, Transport::Tcp { conn_id: c } if c == conn_id))
            .map(|entry| *entry.key())
            .collect();

        victims
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|(k, v)| (k, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Name, QClass, QType};
    use std::net::{IpAddr, Ipv4Addr};

    fn sample() -> PendingQuery {
        PendingQuery {
            question: Question {
                qname: Name::from_fqdn("example.com."),
                qtype: QType::A,
                qclass: QClass::IN,
            },
            client_id: 42,
            rd: true,
            cd: false,
            edns: EdnsInfo::default(),
            transport: Transport::Udp {
                peer: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 53123),
            },
            submitted_at: Instant::now(),
        }
    }

    #[test]
    fn insert_then_remove_round_trips() {
        let table = PendingTable::new(16);
        let id = table.insert(sample()).unwrap();
        assert_eq!(table.len(), 1);
        let got = table.remove(id).unwrap();
        assert_eq!(got.client_id, 42);
        assert!(table.remove(id).is_none());
    }

    #[test]
    fn insert_fails_when_full() {
        let table = PendingTable::new(1);
        table.insert(sample()).unwrap();
        assert!(matches!(table.insert(sample()), Err(FrontendError::TableFull)));
    }

    #[test]
    fn sweep_reclaims_old_entries() {
        let table = PendingTable::new(16);
        table.insert(sample()).unwrap();
        let reclaimed = table.sweep_expired(Duration::from_secs(0));
        assert_eq!(reclaimed.len(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_for_connection_only_drops_matching_tcp_entries() {
        let table = PendingTable::new(16);
        let mut tcp_query = sample();
        tcp_query.transport = Transport::Tcp { conn_id: 7 };
        let tcp_id = table.insert(tcp_query).unwrap();
        let udp_id = table.insert(sample()).unwrap();

        let victims = table.remove_for_connection(7);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].0, tcp_id);
        assert!(table.remove(udp_id).is_some());
    }
}
