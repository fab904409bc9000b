// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the relay service.
//!
//! Every field has a serde default so a partial config deserializes cleanly.
//! [`Config::from_env`] overlays the environment variables the service reads.

use crate::store::DEFAULT_CONFIG_PATH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Location of the whitelist record (default: data/config.json)
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Fallback values for fields missing from a send request
    #[serde(default)]
    pub defaults: MessageDefaults,

    /// Referrer gate configuration
    #[serde(default)]
    pub gate: GateConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay hostname. Sending fails while unset.
    #[serde(default)]
    pub host: Option<String>,

    /// Relay port (default: 587)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Implicit TLS on connect. Otherwise STARTTLS is used when offered.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default, skip_serializing)]
    pub pass: Option<String>,
}

/// Values used when a send request omits a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDefaults {
    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default = "default_to")]
    pub to: String,

    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_body")]
    pub body: String,
}

/// Referrer gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Longest referrer recorded in the whitelist, in bytes (default: 2048)
    #[serde(default = "default_max_referrer_len")]
    pub max_referrer_len: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "no-reply@example.com".to_string()
}

fn default_to() -> String {
    "postmaster@example.com".to_string()
}

fn default_subject() -> String {
    "Test POST endpoint (smtp-relay-gate)".to_string()
}

fn default_body() -> String {
    "Hi this is a test {body}".to_string()
}

fn default_max_referrer_len() -> usize {
    2048
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            config_path: default_config_path(),
            smtp: SmtpConfig::default(),
            defaults: MessageDefaults::default(),
            gate: GateConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            secure: false,
            user: None,
            pass: None,
        }
    }
}

impl Default for MessageDefaults {
    fn default() -> Self {
        Self {
            from: default_from(),
            to: default_to(),
            subject: default_subject(),
            body: default_body(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_referrer_len: default_max_referrer_len(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl SmtpConfig {
    /// Credentials, only when both user and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.pass.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// - `BIND_ADDR`, or `PORT` on all interfaces
    /// - `CONFIG_PATH`
    /// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_SECURE`, `SMTP_USER`, `SMTP_PASS`
    /// - `DEFAULT_FROM`, `DEFAULT_TO`
    /// - `MAX_REFERRER_LEN`
    /// - `METRICS_ENABLED`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = addr;
        } else if let Some(port) = var("PORT").and_then(|p| p.parse::<u16>().ok()) {
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(path) = var("CONFIG_PATH") {
            config.config_path = PathBuf::from(path);
        }

        config.smtp.host = var("SMTP_HOST");
        if let Some(port) = var("SMTP_PORT").and_then(|p| p.parse().ok()) {
            config.smtp.port = port;
        }
        config.smtp.secure = var("SMTP_SECURE").as_deref() == Some("true");
        config.smtp.user = var("SMTP_USER");
        config.smtp.pass = var("SMTP_PASS");

        if let Some(from) = var("DEFAULT_FROM") {
            config.defaults.from = from;
        }
        if let Some(to) = var("DEFAULT_TO") {
            config.defaults.to = to;
        }

        if let Some(len) = var("MAX_REFERRER_LEN").and_then(|v| v.parse().ok()) {
            config.gate.max_referrer_len = len;
        }
        if let Some(enabled) = var("METRICS_ENABLED") {
            config.metrics.enabled = enabled != "false";
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.config_path, PathBuf::from("data/config.json"));
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.secure);
        assert!(config.smtp.host.is_none());
        assert_eq!(config.gate.max_referrer_len, 2048);
    }

    #[test]
    fn test_port_and_bind_addr() {
        assert_eq!(from_pairs(&[("PORT", "8025")]).bind_addr, "0.0.0.0:8025");
        assert_eq!(
            from_pairs(&[("PORT", "8025"), ("BIND_ADDR", "127.0.0.1:9000")]).bind_addr,
            "127.0.0.1:9000"
        );
    }

    #[test]
    fn test_smtp_from_env() {
        let config = from_pairs(&[
            ("SMTP_HOST", "mail.example.org"),
            ("SMTP_PORT", "465"),
            ("SMTP_SECURE", "true"),
            ("SMTP_USER", "relay"),
        ]);
        assert_eq!(config.smtp.host.as_deref(), Some("mail.example.org"));
        assert_eq!(config.smtp.port, 465);
        assert!(config.smtp.secure);
        // Password missing, so no credentials.
        assert!(config.smtp.credentials().is_none());
    }

    #[test]
    fn test_paths_defaults_and_limits_from_env() {
        let config = from_pairs(&[
            ("CONFIG_PATH", "/var/lib/relay/whitelist.json"),
            ("DEFAULT_FROM", "relay@example.org"),
            ("DEFAULT_TO", "ops@example.org"),
            ("MAX_REFERRER_LEN", "512"),
            ("METRICS_ENABLED", "false"),
        ]);
        assert_eq!(
            config.config_path,
            PathBuf::from("/var/lib/relay/whitelist.json")
        );
        assert_eq!(config.defaults.from, "relay@example.org");
        assert_eq!(config.defaults.to, "ops@example.org");
        assert_eq!(config.gate.max_referrer_len, 512);
        assert!(!config.metrics.enabled);

        // Unparseable limits keep the default.
        assert_eq!(
            from_pairs(&[("MAX_REFERRER_LEN", "lots")]).gate.max_referrer_len,
            2048
        );
    }

    #[test]
    fn test_secure_requires_literal_true() {
        assert!(!from_pairs(&[("SMTP_SECURE", "1")]).smtp.secure);
        assert!(!from_pairs(&[("SMTP_SECURE", "TRUE")]).smtp.secure);
    }

    #[test]
    fn test_partial_json_config() {
        let config: Config =
            serde_json::from_str(r#"{ "smtp": { "host": "mx.example.net" } }"#).unwrap();
        assert_eq!(config.smtp.host.as_deref(), Some("mx.example.net"));
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.defaults.body, "Hi this is a test {body}");
        assert!(config.metrics.enabled);
    }
}
