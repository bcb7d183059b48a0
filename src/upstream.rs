use crate::{
    config::Config,
    errors::{AppError, AppResult},
    telemetry,
};
use async_trait::async_trait;
use std::{fmt, time::{Duration, Instant}};
use url::{form_urlencoded, Url};

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Thing,
    Hot,
    Collection,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Search => "search",
            Endpoint::Thing => "thing",
            Endpoint::Hot => "hot",
            Endpoint::Collection => "collection",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery {
    pub endpoint: Endpoint,
    pub params: Vec<(&'static str, String)>,
}

impl UpstreamQuery {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, params: Vec::new() }
    }

    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish()
    }

    pub fn url(&self, base: &Url) -> AppResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(format!("upstream base url cannot carry a path: {base}")))?
            .pop_if_empty()
            .push(self.endpoint.path());
        let qs = self.query_string();
        url.set_query(if qs.is_empty() { None } else { Some(&qs) });
        Ok(url)
    }
}

#[async_trait]
pub trait Upstream {
    async fn fetch(&self, query: &UpstreamQuery) -> AppResult<String>;
}

pub type DynUpstream = std::sync::Arc<dyn Upstream + Send + Sync + 'static>;

pub struct BggClient {
    http: reqwest::Client,
    base: Url,
    api_token: Option<String>,
}

impl BggClient {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.upstream.timeout_s))
            .user_agent(cfg.upstream.user_agent.clone())
            .build()?;
        let base = Url::parse(&cfg.upstream.base_url)?;
        let api_token = cfg.upstream.api_token.clone().filter(|t| !t.trim().is_empty());
        Ok(Self { http, base, api_token })
    }
}

#[async_trait]
impl Upstream for BggClient {
    async fn fetch(&self, query: &UpstreamQuery) -> AppResult<String> {
        let url = query.url(&self.base)?;
        let started = Instant::now();
        let result = self.send(url).await;
        telemetry::upstream_request(query.endpoint, started.elapsed(), result.is_ok());
        let (status, body) = result?;
        if !status.is_success() {
            return Err(AppError::Upstream(format!("{} responded {}: {}", query.endpoint, status, snippet(&body))));
        }
        Ok(body)
    }
}

impl BggClient {
    async fn send(&self, url: Url) -> AppResult<(reqwest::StatusCode, String)> {
        let mut req = self.http.get(url);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;
        Ok((status, body))
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::UpstreamTimeout(e.to_string())
    } else {
        AppError::Upstream(e.to_string())
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    s.push_str("...");
    s
}
