use crate::upstream::Endpoint;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{sync::OnceLock, time::Duration};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn install() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if ::metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("a metrics recorder was already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

pub fn function_call(function: &str, outcome: &'static str) {
    ::metrics::counter!(
        "bgg_relay_function_calls_total",
        "function" => function.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn upstream_request(endpoint: Endpoint, elapsed: Duration, ok: bool) {
    ::metrics::histogram!(
        "bgg_relay_upstream_request_duration_seconds",
        "endpoint" => endpoint.path(),
        "ok" => if ok { "true" } else { "false" }
    )
    .record(elapsed.as_secs_f64());
}

pub fn rate_limited(scope: &'static str) {
    ::metrics::counter!("bgg_relay_rate_limited_total", "scope" => scope).increment(1);
}
