//! Query-name blocklist (§4.8). Holds a flat, case-insensitive set of FQDNs
//! the guard rejects with REFUSED before a query ever reaches the resolver.
//!
//! Grounded on the teacher's `blocking/mod.rs` DashMap-backed domain store,
//! trimmed down: this front-end has no PSL-based registrable-domain logic or
//! per-client policy, just exact-match membership reloaded wholesale from a
//! parent-supplied list.

use std::collections::BTreeSet;
use std::sync::RwLock;

use tracing::debug;

/// Case-insensitive ordered set of blocked names, keyed by their
/// dot-terminated lowercase form so lookups need no allocation beyond the
/// query name's own lowercasing.
pub struct Blocklist {
    names: RwLock<BTreeSet<String>>,
}

impl Blocklist {
    pub fn empty() -> Self {
        Blocklist {
            names: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn from_names<I: IntoIterator<Item = String>>(names: I) -> Self {
        let set = names.into_iter().map(|n| normalize(&n)).collect();
        Blocklist {
            names: RwLock::new(set),
        }
    }

    /// Replace the entire set, as the parent process does on every
    /// `RECONF_BLOCKLIST` message (§4.6).
    pub fn reload<I: IntoIterator<Item = String>>(&self, names: I) {
        let set = names.into_iter().map(|n| normalize(&n)).collect::<BTreeSet<_>>();
        let count = set.len();
        *self.names.write().unwrap() = set;
        debug!(entries = count, "blocklist reloaded");
    }

    pub fn is_blocked(&self, qname: &str) -> bool {
        self.names.read().unwrap().contains(&normalize(qname))
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(name: &str) -> String {
    let mut s = name.to_ascii_lowercase();
    if !s.ends_with('.') {
        s.push('.');
    }
    s
}
