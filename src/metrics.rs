//! Prometheus counters exported on `/metrics`.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{errors::AuthError, state::AppState};

pub struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    auth_events: IntCounterVec,
}

impl Metrics {
    /// Create and register all counters with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("weatherdash_http_requests_total", "HTTP requests by route and status"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let auth_events = IntCounterVec::new(
            Opts::new("weatherdash_auth_events_total", "Auth operations by outcome"),
            &["event", "outcome"],
        )?;
        registry.register(Box::new(auth_events.clone()))?;

        // process_cpu_seconds_total, process_resident_memory_bytes, process_open_fds, ...
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            http_requests,
            auth_events,
        })
    }

    pub fn observe_request(&self, method: &str, route: &str, status: u16) {
        self.http_requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
    }

    pub fn record_auth(&self, event: &str, outcome: &str) {
        self.auth_events.with_label_values(&[event, outcome]).inc();
    }

    pub fn record_outcome<T>(&self, event: &str, outcome: &Result<T, AuthError>) {
        let label = match outcome {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        self.record_auth(event, label);
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Text exposition of every registered metric family.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Counts every response by method, matched route and status.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let response = next.run(req).await;
    state
        .metrics
        .observe_request(&method, &route, response.status().as_u16());
    response
}
