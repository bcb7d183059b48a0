use serde::Deserialize;
use std::fs;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub upstream: Upstream,
    pub limits: Limits,
    pub cache: Cache,
    pub metrics: Metrics,
    pub cors: Cors,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
    pub public_base_url: Option<String>,
    /// Key rate limits on the first `X-Forwarded-For` hop. Only safe behind a proxy that overwrites it.
    pub trust_forwarded_for: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0".to_string(), port: 3000, public_base_url: None, trust_forwarded_for: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Upstream {
    pub base_url: String,
    pub timeout_s: u64,
    pub user_agent: String,
    pub api_token: Option<String>,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            base_url: "https://boardgamegeek.com/xmlapi2".to_string(),
            timeout_s: 10,
            user_agent: concat!("bgg-relay/", env!("CARGO_PKG_VERSION")).to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Limits {
    pub max_request_kb: usize,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_s: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_request_kb: 64, rate_limit_enabled: true, rate_limit_requests: 100, rate_limit_window_s: 900 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Cache {
    /// 0 disables manifest caching.
    pub manifest_ttl_s: u64,
}

impl Default for Cache {
    fn default() -> Self { Self { manifest_ttl_s: 3600 } }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Metrics {
    pub enabled: bool,
}

impl Default for Metrics {
    fn default() -> Self { Self { enabled: true } }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Cors {
    /// Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.bind_addr.trim().is_empty() { anyhow::bail!("bind_addr must not be empty"); }
        let base = Url::parse(&self.upstream.base_url)
            .map_err(|e| anyhow::anyhow!("upstream base_url is not a valid URL: {e}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("upstream base_url must be http or https: {}", self.upstream.base_url);
        }
        if let Some(public) = &self.server.public_base_url {
            Url::parse(public).map_err(|e| anyhow::anyhow!("public_base_url is not a valid URL: {e}"))?;
        }
        if self.upstream.timeout_s == 0 { anyhow::bail!("upstream timeout_s must be > 0"); }
        if self.limits.max_request_kb == 0 { anyhow::bail!("max_request_kb must be > 0"); }
        if self.limits.rate_limit_enabled {
            if self.limits.rate_limit_requests == 0 { anyhow::bail!("rate_limit_requests must be > 0"); }
            if self.limits.rate_limit_window_s == 0 { anyhow::bail!("rate_limit_window_s must be > 0"); }
        }
        Ok(())
    }
}
