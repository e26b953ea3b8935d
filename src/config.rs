//! Process configuration (ambient stack addition). Grounded on the
//! teacher's `config.rs::DnsConfig::from_env` convention of one env var per
//! field, re-expressed as a `clap` derive struct so every field is also a
//! flag and gets `--help` text for free — the `UNWINDD_` prefix plays the
//! role the teacher's `HEIMDALL_` prefix does.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "unwindd-front", about = "DNS front-end for a privilege-separated validating recursive resolver")]
pub struct FrontendConfig {
    /// UDP address to listen for client queries on, when this process
    /// opens its own sockets (standalone/test mode). In production the
    /// parent process hands listening sockets down over the main channel
    /// instead and this is ignored.
    #[arg(long, env = "UNWINDD_UDP_LISTEN", default_value = "127.0.0.1:53")]
    pub udp_listen: SocketAddr,

    #[arg(long, env = "UNWINDD_TCP_LISTEN", default_value = "127.0.0.1:53")]
    pub tcp_listen: SocketAddr,

    /// Unix domain socket connected to the resolver process.
    #[arg(long, env = "UNWINDD_RESOLVER_SOCK", default_value = "/var/run/unwindd/resolver.sock")]
    pub resolver_sock: PathBuf,

    /// Unix domain socket connected to the privileged parent process.
    #[arg(long, env = "UNWINDD_MAIN_SOCK", default_value = "/var/run/unwindd/main.sock")]
    pub main_sock: PathBuf,

    /// Where the committed trust-anchor set is persisted between restarts.
    #[arg(long, env = "UNWINDD_TRUST_ANCHOR_FILE", default_value = "/var/db/unwind.key")]
    pub trust_anchor_file: PathBuf,

    /// Optional file of newline-delimited blocked names, loaded at
    /// startup; the parent process may still reload this set at runtime
    /// over the main channel.
    #[arg(long, env = "UNWINDD_BLOCKLIST_FILE")]
    pub blocklist_file: Option<PathBuf>,

    /// Maximum number of outstanding resolver queries at once.
    #[arg(long, env = "UNWINDD_PENDING_CAPACITY", default_value_t = 4096)]
    pub pending_capacity: usize,

    /// Idle timeout for TCP client connections, in seconds.
    #[arg(long, env = "UNWINDD_TCP_IDLE_SECS", default_value_t = 15)]
    pub tcp_idle_secs: u64,

    /// How often to sweep the pending-query table for resolver timeouts,
    /// in seconds.
    #[arg(long, env = "UNWINDD_SWEEP_INTERVAL_SECS", default_value_t = 5)]
    pub sweep_interval_secs: u64,

    /// How long a query may sit in the pending table before it is given up
    /// on, in seconds.
    #[arg(long, env = "UNWINDD_QUERY_TIMEOUT_SECS", default_value_t = 10)]
    pub query_timeout_secs: u64,

    /// Bind address for the Prometheus metrics and health endpoint; unset
    /// disables it entirely.
    #[arg(long, env = "UNWINDD_METRICS_LISTEN")]
    pub metrics_listen: Option<SocketAddr>,

    /// `tracing-subscriber` filter directive, e.g. `info` or
    /// `unwindd_front=debug`.
    #[arg(long, env = "UNWINDD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl FrontendConfig {
    pub fn from_args_and_env() -> Self {
        FrontendConfig::parse()
    }

    pub fn tcp_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_arguments() {
        let cfg = FrontendConfig::parse_from(["unwindd-front"]);
        assert_eq!(cfg.pending_capacity, 4096);
        assert_eq!(cfg.tcp_idle_secs, 15);
    }
}
