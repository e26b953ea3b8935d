//! The channel to the separate validating recursive resolver process
//! (§4.5). Every query this front-end decides to forward goes out as a
//! `Query` message carrying the pending-table id; everything that comes
//! back is correlated by that same id.

use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;

use super::framing::{read_message, write_message};
use crate::error::Result;

/// Messages this process sends to the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResolverOutbound {
    /// A screened, validated client query. `payload` carries the raw wire
    /// query bytes; `id` is the pending-table correlation id.
    Query { id: u64 },
    /// A new trust anchor to stage, keyed by its RFC 9615-style DS text
    /// form.
    NewTrustAnchor { anchor: String },
    /// All trust anchors for this round have been sent; swap staging into
    /// current.
    NewTrustAnchorsDone,
    /// Abandon whatever trust anchors were staged this round.
    NewTrustAnchorsAbort,
    /// Replace the resolver's upstream forwarder set.
    ReplaceForwarders { forwarders: Vec<String> },
    /// The routing socket reported a DNS-server address change for
    /// `if_index` (or, for an interface departure, an empty `rtdns` with
    /// `src=0`).
    ReplaceDns {
        if_index: u32,
        src: u8,
        rtdns: Vec<u8>,
    },
    /// A relevant network change was observed on the routing socket.
    NetworkChanged,
}

/// Messages the resolver sends back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResolverInbound {
    /// The answer to a previously submitted `Query`. `payload` carries the
    /// raw wire answer.
    Answer { id: u64, bogus: bool, srvfail: bool },
    /// The resolver learned of a new trust anchor on its own (e.g. via a
    /// successful RFC 5011 rollover) and is staging it for this round.
    NewTrustAnchor { anchor: String },
    /// All trust anchors for this round have been sent; swap staging into
    /// current and echo the committed set back.
    NewTrustAnchorsDone,
    /// Abandon whatever trust anchors were staged this round.
    NewTrustAnchorsAbort,
    /// Resolver control/status line, surfaced for logging and metrics.
    CtlStatus { message: String },
}

pub struct ResolverChannel {
    stream: UnixStream,
}

impl ResolverChannel {
    pub fn new(stream: UnixStream) -> Self {
        ResolverChannel { stream }
    }

    pub async fn send_query(&mut self, id: u64, wire_query: &[u8]) -> Result<()> {
        write_message(&mut self.stream, &ResolverOutbound::Query { id }, wire_query).await
    }

    pub async fn send(&mut self, message: &ResolverOutbound) -> Result<()> {
        write_message(&mut self.stream, message, &[]).await
    }

    /// Wait for the next message from the resolver, returning it along
    /// with any raw wire payload (populated for `Answer`).
    pub async fn recv(&mut self) -> Result<(ResolverInbound, Vec<u8>)> {
        read_message(&mut self.stream).await
    }
}
