use crate::{
    config::Limits,
    errors::AppError,
    server::{audit_end, AppState},
    telemetry,
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};

const GLOBAL_FACTOR: u32 = 10;

pub fn content_length_ok(headers: &HeaderMap, max_kb: usize) -> Result<(), AppError> {
    if let Some(len) = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if len > max_kb * 1024 {
            return Err(AppError::RequestTooLarge);
        }
    }
    Ok(())
}

/// First `X-Forwarded-For` hop when trusted, else the peer address, else `"unknown"`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    let forwarded = || {
        headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    trust_forwarded_for
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

struct Limiters {
    global: DefaultDirectRateLimiter,
    per_client: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

#[derive(Clone)]
pub struct RateLimiters {
    inner: Option<Arc<Limiters>>,
}

impl RateLimiters {
    pub fn new(requests: u32, window: Duration) -> Self {
        let per_client = NonZeroU32::new(requests).unwrap_or(nonzero!(1u32));
        let global = NonZeroU32::new(requests.saturating_mul(GLOBAL_FACTOR)).unwrap_or(per_client);
        Self {
            inner: Some(Arc::new(Limiters {
                global: RateLimiter::direct(quota(global, window)),
                per_client: RateLimiter::keyed(quota(per_client, window)),
                clock: DefaultClock::default(),
            })),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn from_limits(limits: &Limits) -> Self {
        if limits.rate_limit_enabled {
            Self::new(limits.rate_limit_requests, Duration::from_secs(limits.rate_limit_window_s))
        } else {
            Self::disabled()
        }
    }

    pub fn check(&self, client: &str) -> Result<(), AppError> {
        let Some(l) = &self.inner else { return Ok(()) };
        if let Err(not_until) = l.per_client.check_key(&client.to_string()) {
            telemetry::rate_limited("client");
            return Err(AppError::RateLimited { retry_after: not_until.wait_time_from(l.clock.now()) });
        }
        if let Err(not_until) = l.global.check() {
            telemetry::rate_limited("global");
            return Err(AppError::RateLimited { retry_after: not_until.wait_time_from(l.clock.now()) });
        }
        Ok(())
    }

    pub fn retain_recent(&self) {
        if let Some(l) = &self.inner {
            l.per_client.retain_recent();
            l.per_client.shrink_to_fit();
        }
    }
}

fn quota(requests: NonZeroU32, window: Duration) -> Quota {
    let period = (window / requests.get()).max(Duration::from_nanos(1));
    Quota::with_period(period).unwrap_or_else(|| Quota::per_second(requests)).allow_burst(requests)
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let client = client_key(req.headers(), peer, state.cfg.server.trust_forwarded_for);
    if let Err(e) = state.rls.check(&client) {
        let request_id = uuid::Uuid::new_v4().to_string();
        audit_end(&request_id, &client, "-", "deny", e.code(), started.elapsed().as_millis() as u64, 0);
        return e.into_response();
    }
    next.run(req).await
}
