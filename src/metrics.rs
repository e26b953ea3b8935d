//! Prometheus metrics (ambient stack addition). A much smaller collector
//! than the teacher's `DnsMetrics` — this process has no cache or upstream
//! pool to report on, just the guard's dispositions, pending-table
//! occupancy, and IPC health — but it is built the same way: one
//! `Registry`, plain `prometheus` collector types, a `unwind_` metric
//! prefix in place of the teacher's `heimdall_`.

use prometheus::{opts, CounterVec, IntCounter, IntGauge, Registry, TextEncoder};

pub struct FrontendMetrics {
    registry: Registry,

    pub queries_total: CounterVec,
    pub guard_rejections: CounterVec,
    pub resolver_answers_total: IntCounter,
    pub resolver_timeouts_total: IntCounter,
    pub pending_queries: IntGauge,
    pub tcp_connections: IntGauge,
    pub truncated_responses_total: IntCounter,
}

impl FrontendMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries_total = CounterVec::new(
            opts!("unwind_queries_total", "Total client queries received"),
            &["transport"],
        )?;

        let guard_rejections = CounterVec::new(
            opts!(
                "unwind_guard_rejections_total",
                "Queries rejected by the guard before reaching the resolver, by rcode"
            ),
            &["rcode"],
        )?;

        let resolver_answers_total = IntCounter::with_opts(opts!(
            "unwind_resolver_answers_total",
            "Total answers received from the resolver process"
        ))?;

        let resolver_timeouts_total = IntCounter::with_opts(opts!(
            "unwind_resolver_timeouts_total",
            "Pending queries reclaimed after the resolver never answered"
        ))?;

        let pending_queries = IntGauge::with_opts(opts!(
            "unwind_pending_queries",
            "Queries currently awaiting a resolver answer"
        ))?;

        let tcp_connections = IntGauge::with_opts(opts!(
            "unwind_tcp_connections",
            "Currently open client TCP connections"
        ))?;

        let truncated_responses_total = IntCounter::with_opts(opts!(
            "unwind_truncated_responses_total",
            "UDP responses truncated to fit the client's size budget"
        ))?;

        registry.register(Box::new(queries_total.clone()))?;
        registry.register(Box::new(guard_rejections.clone()))?;
        registry.register(Box::new(resolver_answers_total.clone()))?;
        registry.register(Box::new(resolver_timeouts_total.clone()))?;
        registry.register(Box::new(pending_queries.clone()))?;
        registry.register(Box::new(tcp_connections.clone()))?;
        registry.register(Box::new(truncated_responses_total.clone()))?;

        Ok(FrontendMetrics {
            registry,
            queries_total,
            guard_rejections,
            resolver_answers_total,
            resolver_timeouts_total,
            pending_queries,
            tcp_connections,
            truncated_responses_total,
        })
    }

    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = String::new();
        if let Err(e) = encoder.encode_utf8(&metric_families, &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_registers_without_conflicts() {
        let metrics = FrontendMetrics::new().unwrap();
        metrics.queries_total.with_label_values(&["udp"]).inc();
        let text = metrics.encode();
        assert!(text.contains("unwind_queries_total"));
    }
}
