use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static INVITES_ACCEPTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "referral_invites_accepted_total",
        "Total invites transitioned from pending to accepted"
    )
    .expect("register invites_accepted_total")
});

pub static POINTS_AWARDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "referral_points_awarded_total",
        "Total points credited by the distribution workflow"
    )
    .expect("register points_awarded_total")
});

pub static DISTRIBUTION_LEVEL_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "referral_distribution_level_failures_total",
        "Total chain levels whose award could not be written"
    )
    .expect("register distribution_level_failures_total")
});

pub static CORRUPT_GRAPH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "referral_corrupt_graph_total",
        "Total traversals aborted by the depth safety cap"
    )
    .expect("register corrupt_graph_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
