use warp::http::StatusCode;
use warp::Filter;

use super::prometheus_reporter::BRIDGE_STATE;
use super::PrometheusReporter;
use crate::domain::value_objects::BridgeState;

/// Health check response structure
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

impl HealthResponse {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

const SERVICE_NAME: &str = "pipeline-publisher";

/// Ready only while the publisher is running: tracks published, pipeline playing
fn readiness(state: f64) -> (&'static str, StatusCode) {
    if state == BridgeState::Running.as_metric() {
        ("ready", StatusCode::OK)
    } else {
        ("not ready", StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let metrics_route = warp::path("metrics").map(|| {
        let body = PrometheusReporter::gather_metrics();
        warp::reply::with_header(body, "content-type", "text/plain; version=0.0.4; charset=utf-8")
    });

    let health_route =
        warp::path("health").map(|| warp::reply::json(&HealthResponse::new("healthy")));

    let liveness_route = warp::path("livez").map(|| warp::reply::with_status("OK", StatusCode::OK));

    let readiness_route = warp::path("readyz").map(|| {
        let (status, code) = readiness(BRIDGE_STATE.get());
        warp::reply::with_status(warp::reply::json(&HealthResponse::new(status)), code)
    });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    metrics_route
        .or(health_route)
        .or(liveness_route)
        .or(readiness_route)
        .with(cors)
}

/// Serves `/metrics` plus health and probe endpoints until the runtime stops
pub async fn serve_metrics(port: u16) {
    tracing::info!("Metrics server starting on port {}", port);

    warp::serve(routes()).run(([0, 0, 0, 0], port)).await;
}
