// Configuration module entry point
// Loads layered configuration and holds the runtime state shared by handlers

mod state;
mod types;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    AuthConfig, Config, DatabaseConfig, HealthConfig, HttpConfig, LoggingConfig,
    PerformanceConfig, ServerConfig, SiteConfig, StoreBackend,
};

/// Environment variable that overrides `server.port`
const PORT_VAR: &str = "PORT";

/// Built-in defaults, the lowest configuration layer
fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("performance.shutdown_grace", 10)?
        .set_default("http.server_name", "Event-Portal/0.1")?
        .set_default("http.enable_cors", false)?
        .set_default("http.max_body_size", 1_048_576)? // 1MB
        .set_default("database.backend", "mongodb")?
        .set_default("database.uri", "mongodb://localhost:27017")?
        .set_default("database.name", "Event_Management_System")?
        .set_default("database.users_collection", "logindetails")?
        .set_default("database.events_collection", "Event")?
        .set_default("database.server_selection_timeout_ms", 5000)?
        .set_default("site.views_dir", "views")?
        .set_default("site.images_dir", "images")?
        .set_default("site.public_dir", "public")?
        .set_default("site.landing_path", "/index")?
        .set_default("auth.legacy_plaintext", false)?
        .set_default("health.enabled", true)?
        .set_default("health.liveness_path", "/healthz")?
        .set_default("health.readiness_path", "/readyz")
}

impl Config {
    /// Load configuration from the given file path (without extension).
    ///
    /// Layers, lowest first: defaults, the optional file, `EVENTS_*`
    /// environment variables (`EVENTS_DATABASE__URI`), then `PORT`.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("EVENTS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var(PORT_VAR).ok())?
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only, ignoring files and the environment
    pub fn from_defaults() -> Result<Self, ConfigError> {
        defaults()?.build()?.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_defaults().unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.database.backend, StoreBackend::Mongodb);
        assert_eq!(cfg.database.name, "Event_Management_System");
        assert_eq!(cfg.database.users_collection, "logindetails");
        assert_eq!(cfg.database.events_collection, "Event");
        assert_eq!(cfg.site.landing_path, "/index");
        assert!(!cfg.auth.legacy_plaintext);
        assert!(cfg.logging.access_log_file.is_none());
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[database]\nbackend = \"memory\"\n\n[logging]\nlevel = \"debug\"\naccess_log_format = \"json\""
        )
        .unwrap();

        let stem = dir.path().join("portal");
        let cfg = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.database.backend, StoreBackend::Memory);
        assert_eq!(cfg.logging.level, crate::logger::LogLevel::Debug);
        assert_eq!(cfg.logging.access_log_format, "json");
        // untouched keys keep their defaults
        assert_eq!(cfg.database.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = Config::from_defaults().unwrap();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.port = 8081;
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8081);

        cfg.server.host = "not a host".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
