use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static ENVELOPES_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "live_overlay_envelopes_received_total",
        "Live event envelopes received, by category",
        &["category"],
    )
});

static ENVELOPES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "live_overlay_envelopes_dropped_total",
        "Envelopes acknowledged without being displayed, by reason",
        &["reason"],
    )
});

static ACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "live_overlay_acks_total",
        "Acknowledgments sent back to the event source, by outcome",
        &["outcome"],
    )
});

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("invalid metric definition {name}: {e}"));
    if let Err(e) = prometheus::default_registry().register(Box::new(counter.clone())) {
        tracing::warn!(metric = name, error = %e, "metric registration failed");
    }
    counter
}

pub fn record_received(category: &str) {
    ENVELOPES_RECEIVED_TOTAL
        .with_label_values(&[category])
        .inc();
}

pub fn record_dropped(reason: &str) {
    ENVELOPES_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_ack(outcome: &str) {
    ACKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Text exposition of the default registry
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
