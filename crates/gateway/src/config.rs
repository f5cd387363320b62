use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// In-process store, lost on restart.
    Memory,
    Redis,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "boxkeeper-gateway", version, about = "BoxKeeper inventory HTTP gateway")]
pub struct Config {
    #[arg(long, env = "BOXKEEPER_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    #[arg(long, env = "BOXKEEPER_STORE", value_enum, default_value_t = StoreKind::Redis)]
    pub store: StoreKind,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[arg(long, env = "BOXKEEPER_REDIS_TIMEOUT_MS", default_value_t = 500)]
    pub redis_timeout_ms: u64,

    /// Session signing secret, at least 32 bytes. Changing it logs every user out.
    #[arg(
        long,
        env = "BOXKEEPER_JWT_SECRET",
        hide_env_values = true,
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub jwt_secret: String,

    #[arg(long, env = "BOXKEEPER_ARTIFACT_DIR", default_value = "./artifacts")]
    pub artifact_dir: PathBuf,

    #[arg(long, env = "BOXKEEPER_PUBLIC_BASE_URL", default_value = "http://localhost:8080/artifacts")]
    pub public_base_url: String,

    #[arg(long, env = "BOXKEEPER_MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,
}

impl Config {
    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_with_defaults() {
        let cfg = Config::try_parse_from([
            "boxkeeper-gateway",
            "--jwt-secret",
            "config-test-secret-0123456789abcdef",
            "--store",
            "memory",
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreKind::Memory);
        assert_eq!(cfg.listen.port(), 8080);
        assert_eq!(cfg.max_upload_bytes(), 10 * 1024 * 1024);
        assert_eq!(cfg.redis_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn empty_secret_is_refused() {
        let parsed = Config::try_parse_from(["boxkeeper-gateway", "--jwt-secret", "", "--store", "memory"]);
        assert!(parsed.is_err());
    }
}
