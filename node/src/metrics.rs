//! Prometheus metrics for the LMNode service.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] so the host can merge it
//! into its own exposition endpoint or call [`NodeMetrics::encode`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Announcements admitted or applied.
    pub broadcasts_accepted: IntCounter,
    /// Announcements rejected, with or without a misbehaviour score.
    pub broadcasts_rejected: IntCounter,
    pub pings_accepted: IntCounter,
    pub payment_votes_accepted: IntCounter,
    /// Verification messages of any phase handled.
    pub verifications_processed: IntCounter,
    /// Misbehaviour reports handed to the host.
    pub misbehaviour_reports: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub registry_size: IntGauge,
    pub enabled_count: IntGauge,
    pub payment_blocks: IntGauge,
    pub payment_votes: IntGauge,
    /// Numeric id of the current sync asset.
    pub sync_asset: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent handling one inbound message, in milliseconds.
    pub message_process_time_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let broadcasts_accepted = register_int_counter_with_registry!(
            Opts::new(
                "lmnode_broadcasts_accepted_total",
                "Masternode announcements accepted"
            ),
            registry
        )
        .expect("failed to register broadcasts_accepted counter");

        let broadcasts_rejected = register_int_counter_with_registry!(
            Opts::new(
                "lmnode_broadcasts_rejected_total",
                "Masternode announcements rejected"
            ),
            registry
        )
        .expect("failed to register broadcasts_rejected counter");

        let pings_accepted = register_int_counter_with_registry!(
            Opts::new("lmnode_pings_accepted_total", "Masternode pings accepted"),
            registry
        )
        .expect("failed to register pings_accepted counter");

        let payment_votes_accepted = register_int_counter_with_registry!(
            Opts::new(
                "lmnode_payment_votes_accepted_total",
                "Payment votes accepted"
            ),
            registry
        )
        .expect("failed to register payment_votes_accepted counter");

        let verifications_processed = register_int_counter_with_registry!(
            Opts::new(
                "lmnode_verifications_processed_total",
                "Proof-of-service messages processed"
            ),
            registry
        )
        .expect("failed to register verifications_processed counter");

        let misbehaviour_reports = register_int_counter_with_registry!(
            Opts::new(
                "lmnode_misbehaviour_reports_total",
                "Peers reported for misbehaviour"
            ),
            registry
        )
        .expect("failed to register misbehaviour_reports counter");

        let registry_size = register_int_gauge_with_registry!(
            Opts::new("lmnode_registry_size", "Known masternodes"),
            registry
        )
        .expect("failed to register registry_size gauge");

        let enabled_count = register_int_gauge_with_registry!(
            Opts::new("lmnode_enabled_count", "Enabled masternodes"),
            registry
        )
        .expect("failed to register enabled_count gauge");

        let payment_blocks = register_int_gauge_with_registry!(
            Opts::new("lmnode_payment_blocks", "Heights with payment votes"),
            registry
        )
        .expect("failed to register payment_blocks gauge");

        let payment_votes = register_int_gauge_with_registry!(
            Opts::new("lmnode_payment_votes", "Stored payment votes"),
            registry
        )
        .expect("failed to register payment_votes gauge");

        let sync_asset = register_int_gauge_with_registry!(
            Opts::new("lmnode_sync_asset", "Current sync asset id"),
            registry
        )
        .expect("failed to register sync_asset gauge");

        // 0.05 ms → ~800 ms.
        let message_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "lmnode_message_process_time_ms",
                "Inbound message handling time in milliseconds"
            )
            .buckets(
                prometheus::exponential_buckets(0.05, 2.0, 15)
                    .expect("static bucket layout is valid")
            ),
            registry
        )
        .expect("failed to register message_process_time_ms histogram");

        Self {
            registry,
            broadcasts_accepted,
            broadcasts_rejected,
            pings_accepted,
            payment_votes_accepted,
            verifications_processed,
            misbehaviour_reports,
            registry_size,
            enabled_count,
            payment_blocks,
            payment_votes,
            sync_asset,
            message_process_time_ms,
        }
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("failed to encode metrics: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_names_every_family() {
        let metrics = NodeMetrics::new();
        metrics.broadcasts_accepted.inc();
        metrics.registry_size.set(12);
        let text = metrics.encode();
        assert!(text.contains("lmnode_broadcasts_accepted_total 1"));
        assert!(text.contains("lmnode_registry_size 12"));
        assert!(text.contains("lmnode_message_process_time_ms"));
    }
}
