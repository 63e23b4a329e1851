// Demo / smoke-test entrypoint for the cache.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use cbytecache::{Cache, CacheConfigBuilder, CacheConfigFile, Xxh3Hasher};

const CONFIG_PATH: &str = "cfg/cbytecache.cfg.yaml";

/// cbytecache - in-process, sharded, TTL-bounded byte cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

fn configure_logger() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty())
        .init();
}

fn load_cfg(path: Option<PathBuf>) -> Result<CacheConfigFile> {
    let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_PATH));
    match CacheConfigFile::load(&path) {
        Ok(cfg) => {
            info!(component = "config", event = "load_success", path = ?path, "config loaded");
            Ok(cfg)
        }
        Err(e) => {
            info!(component = "config", event = "load_fallback", error = %e, "using default config");
            Ok(CacheConfigFile::default())
        }
    }
}

fn main() -> Result<()> {
    configure_logger();
    let args = Args::parse();

    info!(component = "main", event = "startup", cpus = num_cpus::get(), "detected available cores");

    let file = load_cfg(args.cfg)?;
    let config = CacheConfigBuilder::new(file)
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .context("failed to build cache config")?;

    let cache = Cache::new(config).context("failed to construct cache")?;

    cache.set(b"hello", b"world")?;
    let payload = cache.get(b"hello")?;
    info!(
        component = "main",
        event = "demo_round_trip",
        payload = %String::from_utf8_lossy(&payload),
        "demo set/get round trip succeeded"
    );

    let snap = cache.size();
    info!(
        component = "main",
        event = "size_snapshot",
        total = snap.total,
        used = snap.used,
        free = snap.free,
        "cache size"
    );

    cache.close().context("failed to close cache")?;
    Ok(())
}
