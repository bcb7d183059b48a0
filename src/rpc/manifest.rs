use super::{registry::FunctionRegistry, types::FunctionDescriptor};
use crate::config::Config;
use axum::http::{header, HeaderMap};
use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

pub const FUNCTIONS_PATH: &str = "/functions";

/// Single-entry TTL cache for the descriptor list. A zero TTL rebuilds on every read.
pub struct ManifestCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Arc<Vec<FunctionDescriptor>>)>>,
}

impl ManifestCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: RwLock::new(None) }
    }

    pub fn descriptors(&self, registry: &FunctionRegistry) -> Arc<Vec<FunctionDescriptor>> {
        if self.ttl.is_zero() {
            return Arc::new(registry.descriptors());
        }
        {
            let guard = self.entry.read().unwrap_or_else(|e| e.into_inner());
            if let Some((at, list)) = guard.as_ref() {
                if at.elapsed() < self.ttl {
                    return list.clone();
                }
            }
        }
        let mut guard = self.entry.write().unwrap_or_else(|e| e.into_inner());
        // another request may have refreshed it while we waited
        if let Some((at, list)) = guard.as_ref() {
            if at.elapsed() < self.ttl {
                return list.clone();
            }
        }
        let list = Arc::new(registry.descriptors());
        tracing::debug!(functions = list.len(), "manifest cache refreshed");
        *guard = Some((Instant::now(), list.clone()));
        list
    }
}

pub fn callback_url(cfg: &Config, headers: &HeaderMap) -> String {
    if let Some(public) = &cfg.server.public_base_url {
        return format!("{}{FUNCTIONS_PATH}", public.trim_end_matches('/'));
    }
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let host = header_str("X-Forwarded-Host")
        .or_else(|| header_str(header::HOST.as_str()))
        .unwrap_or_else(|| format!("{}:{}", cfg.server.bind_addr, cfg.server.port));
    let scheme = header_str("X-Forwarded-Proto").unwrap_or_else(|| "http".to_string());
    format!("{scheme}://{host}{FUNCTIONS_PATH}")
}
