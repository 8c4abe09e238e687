use anyhow::ensure;
use clap::Parser;
use compactness::DEFAULT_K_THRESHOLD;
use std::net::SocketAddr;

/// `clean_service` - Hides polygons that are too thin or irregular to display.
///
/// Serves `POST /clean`, which reprojects each submitted polygon into a planar
/// CRS and returns the ids whose compactness index `perimeter² / area`
/// exceeds a threshold.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The listen address for the HTTP API.
    #[arg(long, env = "CLEAN_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: SocketAddr,

    /// The listen address for the Prometheus metrics server.
    #[arg(long, env = "CLEAN_METRICS_LISTEN_ADDR", default_value = "0.0.0.0:9091")]
    pub metrics_listen_addr: SocketAddr,

    /// EPSG code of the planar CRS that polygons are measured in.
    ///
    /// Supported: 4513-4554 (CGCS2000 3-degree Gauss-Kruger) and
    /// 32601-32660 / 32701-32760 (WGS84 / UTM).
    #[arg(long, env = "CLEAN_TARGET_EPSG", default_value_t = 4513)]
    pub target_epsg: u32,

    /// Threshold applied when a request omits `k_threshold` or sends null.
    #[arg(long, env = "CLEAN_DEFAULT_K_THRESHOLD", default_value_t = DEFAULT_K_THRESHOLD)]
    pub default_k_threshold: f64,

    /// Comma-separated list of origins allowed by CORS.
    ///
    /// When empty, any origin is accepted and echoed back with credentials
    /// allowed. Set this in production.
    #[arg(long, env = "CLEAN_CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.default_k_threshold.is_finite(),
            "CLEAN_DEFAULT_K_THRESHOLD must be a finite number, got {}",
            self.default_k_threshold
        );
        Ok(())
    }
}
