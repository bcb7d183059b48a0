mod config;
mod errors;
mod functions;
mod logging;
mod rpc;
mod security;
mod server;
mod telemetry;
mod upstream;


use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "bgg-relay.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut port: Option<u16> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let Some(p) = args.get(i) else { anyhow::bail!("--config requires a path") };
                config_path = Some(PathBuf::from(p));
            }
            "--port" => {
                i += 1;
                let Some(p) = args.get(i) else { anyhow::bail!("--port requires a number") };
                port = Some(p.parse().with_context(|| format!("invalid --port {p}"))?);
            }
            other => warn!(arg = other, "ignoring unknown argument"),
        }
        i += 1;
    }

    let mut cfg = match config_path {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path.display()))?,
        None if PathBuf::from(DEFAULT_CONFIG).exists() => {
            Config::load(&PathBuf::from(DEFAULT_CONFIG)).context("loading config")?
        }
        None => {
            info!(path = DEFAULT_CONFIG, "no config file, using defaults");
            Config::default()
        }
    };
    if let Some(port) = port {
        cfg.server.port = port;
    }
    cfg.validate().context("validating config")?;

    info!(
        bind_addr = %cfg.server.bind_addr,
        port = cfg.server.port,
        upstream = %cfg.upstream.base_url,
        rate_limit = cfg.limits.rate_limit_enabled,
        metrics = cfg.metrics.enabled,
        "starting bgg-relay"
    );

    server::serve(cfg).await
}
