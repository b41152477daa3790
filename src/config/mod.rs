use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

const DEFAULT_PORT: u16 = 4310;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML file layer ──────────────────────────────────────────────────────────

/// Optional overrides read from `{data_dir}/config.toml`. Every field has a
/// CLI/env counterpart that wins over it.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    /// REST server port (default: 4310).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,galaksiod=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Hosted KV REST endpoint. Omit to run on the in-memory dev store.
    kv_url: Option<String>,
    /// Bearer token for the hosted KV endpoint.
    kv_token: Option<String>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the REST server (GALAKSIOD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Hosted KV REST endpoint (KV_REST_API_URL env var, the name the
    /// platform injects). None = in-memory dev store, nothing persisted.
    pub kv_url: Option<String>,
    /// Bearer token for the hosted KV endpoint (KV_REST_API_TOKEN env var).
    pub kv_token: Option<String>,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("GALAKSIOD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("GALAKSIOD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let kv_url = std::env::var("KV_REST_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.kv_url);

        let kv_token = std::env::var("KV_REST_API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.kv_token);

        Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            kv_url,
            kv_token,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/galaksiod
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("galaksiod");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/galaksiod or ~/.local/share/galaksiod
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("galaksiod");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("galaksiod");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\galaksiod
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("galaksiod");
        }
    }
    // Fallback
    PathBuf::from(".galaksiod")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_a_toml_file() {
        let dir = TempDir::new().unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.log, "info");
        assert_eq!(cfg.bind_address, "127.0.0.1");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 9999\nlog = \"debug\"\nkv_url = \"https://kv.example.com\"\n",
        )
        .unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.log, "debug");
        assert_eq!(cfg.kv_url.as_deref(), Some("https://kv.example.com"));
    }

    #[test]
    fn cli_args_win_over_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = 9999\n").unwrap();
        let cfg = DaemonConfig::new(
            Some(4311),
            Some(dir.path().to_path_buf()),
            None,
            Some("0.0.0.0".to_string()),
        );
        assert_eq!(cfg.port, 4311);
        assert_eq!(cfg.bind_address, "0.0.0.0");
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = \"not a port").unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }
}
