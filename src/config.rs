//! Configuration management for ocserv-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_INTERVAL: &str = "30s";
pub const DEFAULT_OCCTL_PATH: &str = crate::occtl::OCCTL_BINARY;
pub const DEFAULT_COMMAND_TIMEOUT: &str = "5s";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Locations probed when no config file is given.
const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/ocserv-exporter/config.yaml",
    "/etc/ocserv-exporter/config.yml",
    "/etc/ocserv-exporter/config.json",
    "./ocserv-exporter.yaml",
    "./ocserv-exporter.yml",
    "./ocserv-exporter.json",
];

/// Exporter configuration. Unset values fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub listen: Option<String>,

    // occtl polling
    pub interval: Option<String>,
    #[serde(alias = "occtl-path")]
    pub occtl_path: Option<String>,
    #[serde(alias = "command-timeout")]
    pub command_timeout: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: Some(DEFAULT_LISTEN_ADDR.to_string()),
            interval: Some(DEFAULT_INTERVAL.to_string()),
            occtl_path: Some(DEFAULT_OCCTL_PATH.to_string()),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT.to_string()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn listen(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    /// Address suitable for binding; an empty host (":8000") means all interfaces.
    pub fn bind_address(&self) -> Result<String, Box<dyn std::error::Error>> {
        let (host, port) = split_listen(self.listen())?;
        if host.is_empty() {
            Ok(format!("0.0.0.0:{}", port))
        } else {
            Ok(format!("{}:{}", host, port))
        }
    }

    pub fn refresh_interval(&self) -> Result<Duration, Box<dyn std::error::Error>> {
        let raw = self.interval.as_deref().unwrap_or(DEFAULT_INTERVAL);
        non_zero_duration("interval", raw)
    }

    pub fn command_timeout(&self) -> Result<Duration, Box<dyn std::error::Error>> {
        let raw = self
            .command_timeout
            .as_deref()
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT);
        non_zero_duration("command_timeout", raw)
    }

    pub fn occtl_path(&self) -> &str {
        self.occtl_path.as_deref().unwrap_or(DEFAULT_OCCTL_PATH)
    }

    pub fn log_level(&self) -> Result<LogLevel, Box<dyn std::error::Error>> {
        let raw = self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
        LogLevel::from_str(raw, true).map_err(|_| {
            format!(
                "Invalid log_level '{}', expected one of off, error, warn, info, debug, trace",
                raw
            )
            .into()
        })
    }
}

/// Parses a Go-style duration such as `500ms`, `30s`, `1m30s` or `2h`.
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let invalid = || format!("invalid duration '{}'", input);
    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => return Err(format!("missing unit in duration '{}'", input)),
            other => {
                return Err(format!(
                    "unknown unit '{}' in duration '{}', expected ms, s, m or h",
                    other, input
                ))
            }
        };
        total = total.saturating_add(part);
    }

    Ok(total)
}

fn non_zero_duration(key: &str, raw: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let duration = parse_duration(raw).map_err(|e| format!("Invalid {}: {}", key, e))?;
    if duration.is_zero() {
        return Err(format!("Invalid {}: must be greater than zero", key).into());
    }
    Ok(duration)
}

fn split_listen(listen: &str) -> Result<(&str, u16), Box<dyn std::error::Error>> {
    let (host, port) = listen
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid listen address '{}', expected host:port", listen))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| format!("Invalid port in listen address '{}'", listen))?;
    Ok((host, port))
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    split_listen(cfg.listen())?;
    cfg.refresh_interval()?;
    cfg.command_timeout()?;
    cfg.log_level()?;

    if cfg.occtl_path().trim().is_empty() {
        return Err("occtl_path must not be empty".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", kind, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(listen) = &args.listen {
        config.listen = Some(listen.clone());
    }
    if let Some(interval) = &args.interval {
        config.interval = Some(interval.clone());
    }
    if let Some(path) = &args.occtl_path {
        config.occtl_path = Some(path.clone());
    }
    if let Some(timeout) = &args.command_timeout {
        config.command_timeout = Some(timeout.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads the given config file, or the first default location that exists.
/// Without any file the defaults are returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration(" 45 ").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10").is_ok());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.listen(), "127.0.0.1:8000");
        assert_eq!(cfg.refresh_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(cfg.command_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(cfg.occtl_path(), "occtl");
        assert_eq!(cfg.log_level().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cfg = Config {
            interval: Some("0s".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("interval"), "{}", err);
    }

    #[test]
    fn test_listen_validation() {
        let mut cfg = Config {
            listen: Some("localhost".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        cfg.listen = Some("0.0.0.0:http".into());
        assert!(validate_effective_config(&cfg).is_err());

        cfg.listen = Some(":9617".into());
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.bind_address().unwrap(), "0.0.0.0:9617");

        cfg.listen = Some("[::1]:8000".into());
        assert_eq!(cfg.bind_address().unwrap(), "[::1]:8000");
    }

    #[test]
    fn test_invalid_log_level() {
        let cfg = Config {
            log_level: Some("loud".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_tls_requires_both_paths() {
        let cfg = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/nonexistent/cert.pem".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "TLS is enabled but tls_key_path is not set");
    }

    #[test]
    fn test_load_yaml_config() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "listen: \"0.0.0.0:9617\"\ninterval: 1m\nocctl-path: /usr/bin/occtl").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.listen(), "0.0.0.0:9617");
        assert_eq!(cfg.refresh_interval().unwrap(), Duration::from_secs(60));
        assert_eq!(cfg.occtl_path(), "/usr/bin/occtl");
        // Keys missing from the file fall back to defaults.
        assert_eq!(cfg.command_timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_json_and_toml_config() {
        let mut json = Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"interval": "15s", "command_timeout": "2s"}}"#).unwrap();
        let cfg = load_config(Some(json.path())).unwrap();
        assert_eq!(cfg.refresh_interval().unwrap(), Duration::from_secs(15));
        assert_eq!(cfg.command_timeout().unwrap(), Duration::from_secs(2));

        let mut toml_file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "listen = \"127.0.0.1:9100\"").unwrap();
        let cfg = load_config(Some(toml_file.path())).unwrap();
        assert_eq!(cfg.listen(), "127.0.0.1:9100");
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/ocserv-exporter.yaml"))).is_err());
    }

    #[test]
    fn test_render_config_round_trip() {
        let cfg = Config::default();
        let yaml = render_config(&cfg, &ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
    }
}
