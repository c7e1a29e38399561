/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/shopie | Working directory for the database and logs |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | Runtime environment |
/// | INVARIANT_SWEEP_MS | 30000 | Interval between invariant sweeps (ms) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Grace period for in-flight requests on shutdown (ms) |
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory holding the database file and logs
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Interval between invariant sweeps, in milliseconds
    pub invariant_sweep_ms: u64,
    /// Grace period for in-flight requests on shutdown, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/shopie".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            invariant_sweep_ms: std::env::var("INVARIANT_SWEEP_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// Override the fields tests care about
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Path of the embedded database file
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.work_dir).join("shopie.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let config = Config::with_overrides("/tmp/shopie-test", 8080);
        assert_eq!(config.work_dir, "/tmp/shopie-test");
        assert_eq!(config.http_port, 8080);
        assert_eq!(
            config.database_path(),
            std::path::PathBuf::from("/tmp/shopie-test/shopie.redb")
        );
    }
}
