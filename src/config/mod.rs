//! Configuration management for Encounter Core

use anyhow::{bail, Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
    /// Audit sink selection
    pub audit: AuditConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            metrics_enabled: false,
            service_name: "encounter-core".to_string(),
        }
    }
}

/// Which audit sink the service emits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditSinkKind {
    /// In-process buffer; contents are lost on exit
    #[default]
    Memory,
    /// Structured events on the `audit` tracing target
    Tracing,
}

impl std::str::FromStr for AuditSinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(AuditSinkKind::Memory),
            "tracing" | "log" => Ok(AuditSinkKind::Tracing),
            _ => Err(format!("Unknown audit sink: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(anyhow::Error::msg)
                .context("Invalid LOG_FORMAT")?,
            None => LogFormat::default(),
        };

        let metrics_enabled = match lookup("METRICS_ENABLED") {
            Some(raw) => parse_bool(&raw).context("Invalid METRICS_ENABLED")?,
            None => false,
        };

        let service_name = lookup("SERVICE_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "encounter-core".to_string());

        let sink = match lookup("AUDIT_SINK") {
            Some(raw) => raw
                .parse::<AuditSinkKind>()
                .map_err(anyhow::Error::msg)
                .context("Invalid AUDIT_SINK")?,
            None => AuditSinkKind::default(),
        };

        Ok(Self {
            telemetry: TelemetryConfig {
                log_format,
                metrics_enabled,
                service_name,
            },
            audit: AuditConfig { sink },
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
        assert!(!config.telemetry.metrics_enabled);
        assert_eq!(config.telemetry.service_name, "encounter-core");
        assert_eq!(config.audit.sink, AuditSinkKind::Memory);
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            ("LOG_FORMAT", "JSON"),
            ("METRICS_ENABLED", "true"),
            ("SERVICE_NAME", "encounters-eu"),
            ("AUDIT_SINK", "tracing"),
        ]))
        .unwrap();

        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert!(config.telemetry.metrics_enabled);
        assert_eq!(config.telemetry.service_name, "encounters-eu");
        assert_eq!(config.audit.sink, AuditSinkKind::Tracing);
    }

    #[test]
    fn test_invalid_audit_sink() {
        let err = Config::from_lookup(lookup(&[("AUDIT_SINK", "kafka")])).unwrap_err();
        assert!(err.to_string().contains("AUDIT_SINK"));
    }

    #[test]
    fn test_invalid_bool() {
        let err = Config::from_lookup(lookup(&[("METRICS_ENABLED", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("METRICS_ENABLED"));
    }

    #[test]
    fn test_blank_service_name_uses_default() {
        let config = Config::from_lookup(lookup(&[("SERVICE_NAME", "  ")])).unwrap();
        assert_eq!(config.telemetry.service_name, "encounter-core");
    }
}
