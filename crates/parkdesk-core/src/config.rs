// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer configuration.
//
// Loaded from an optional JSON file, then overridden by `PARKDESK_PRINTER_*`
// environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PrinterError, Result};
use crate::types::{Locale, TextEncoding, TransportKind};

/// Standard raw TCP port for receipt printers (JetDirect).
pub const DEFAULT_TCP_PORT: u16 = 9100;

/// Prefix of every recognised environment variable.
pub const ENV_PREFIX: &str = "PARKDESK_PRINTER_";

/// Text printed in every receipt header and footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub business_name: String,
    pub address: Option<String>,
    pub footer: Vec<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            business_name: "ESTACIONAMIENTO".into(),
            address: None,
            footer: Vec::new(),
        }
    }
}

/// Printer driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub transport: TransportKind,
    /// USB character device. `None` means the platform candidate table decides.
    pub device_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: u16,
    /// Spooler queue name (spooler transport).
    pub queue_name: Option<String>,
    /// Characters per line on the paper roll (32 for 58mm, 48 for 80mm).
    pub columns: usize,
    pub encoding: TextEncoding,
    pub locale: Locale,
    pub connect_timeout_ms: u64,
    /// Session establishment attempts per connect.
    pub retry_attempts: u32,
    /// Fixed pause between connect attempts and before a reconnect.
    pub retry_delay_ms: u64,
    pub branding: Branding,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Usb,
            device_path: None,
            host: None,
            port: DEFAULT_TCP_PORT,
            queue_name: None,
            columns: 32,
            encoding: TextEncoding::Utf8,
            locale: Locale::EsMx,
            connect_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_delay_ms: 5_000,
            branding: Branding::default(),
        }
    }
}

/// The one endpoint that is authoritative for the configured transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Device(Option<PathBuf>),
    Network { host: String, port: u16 },
    Queue(String),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(Some(path)) => write!(f, "usb:{}", path.display()),
            Self::Device(None) => f.write_str("usb:auto"),
            Self::Network { host, port } => write!(f, "tcp:{host}:{port}"),
            Self::Queue(name) => write!(f, "spooler:{name}"),
        }
    }
}

impl PrinterConfig {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PARKDESK_PRINTER_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("TRANSPORT") {
            self.transport = v.parse().map_err(PrinterError::InvalidConfig)?;
        }
        if let Some(v) = get("DEVICE") {
            self.device_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOST") {
            self.host = Some(v);
        }
        if let Some(v) = get("PORT") {
            self.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("QUEUE") {
            self.queue_name = Some(v);
        }
        if let Some(v) = get("TIMEOUT_MS") {
            self.connect_timeout_ms = parse_number("TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_number("RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_number("RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = get("COLUMNS") {
            self.columns = parse_number("COLUMNS", &v)?;
        }
        if let Some(v) = get("ENCODING") {
            self.encoding = v.parse().map_err(PrinterError::InvalidConfig)?;
        }
        if let Some(v) = get("LOCALE") {
            self.locale = v.parse().map_err(PrinterError::InvalidConfig)?;
        }
        Ok(())
    }

    /// Check that the settings can describe a usable printer.
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 {
            return Err(PrinterError::InvalidConfig("columns must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(PrinterError::InvalidConfig(
                "retry_attempts must be at least 1".into(),
            ));
        }
        match self.transport {
            TransportKind::Tcp if self.host.as_deref().is_none_or(str::is_empty) => Err(
                PrinterError::InvalidConfig("tcp transport requires a host".into()),
            ),
            TransportKind::Spooler if self.queue_name.as_deref().is_none_or(str::is_empty) => {
                Err(PrinterError::InvalidConfig(
                    "spooler transport requires a queue name".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The endpoint the active transport kind uses; other fields are ignored.
    pub fn endpoint(&self) -> Endpoint {
        match self.transport {
            TransportKind::Usb => Endpoint::Device(self.device_path.clone()),
            TransportKind::Tcp => Endpoint::Network {
                host: self.host.clone().unwrap_or_default(),
                port: self.port,
            },
            TransportKind::Spooler => Endpoint::Queue(self.queue_name.clone().unwrap_or_default()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, value: &str) -> Result<N> {
    value
        .parse()
        .map_err(|_| PrinterError::InvalidConfig(format!("{ENV_PREFIX}{name}: '{value}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = PrinterConfig::default();
        assert_eq!(config.transport, TransportKind::Usb);
        assert_eq!(config.port, 9100);
        assert_eq!(config.columns, 32);
        assert_eq!(config.encoding, TextEncoding::Utf8);
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint(), Endpoint::Device(None));
    }

    #[test]
    fn env_overrides_switch_to_tcp() {
        let mut config = PrinterConfig::default();
        config
            .apply_overrides(lookup(&[
                ("TRANSPORT", "tcp"),
                ("HOST", "192.168.1.50"),
                ("PORT", "9101"),
                ("RETRY_DELAY_MS", "250"),
                ("COLUMNS", "48"),
                ("LOCALE", "en-US"),
            ]))
            .expect("overrides");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.endpoint(),
            Endpoint::Network {
                host: "192.168.1.50".into(),
                port: 9101
            }
        );
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.columns, 48);
        assert_eq!(config.locale, Locale::EnUs);
    }

    #[test]
    fn bad_number_is_invalid_config() {
        let mut config = PrinterConfig::default();
        let err = config
            .apply_overrides(lookup(&[("PORT", "ninety")]))
            .unwrap_err();
        assert!(matches!(err, PrinterError::InvalidConfig(_)));
    }

    #[test]
    fn blank_values_are_ignored() {
        let mut config = PrinterConfig::default();
        config
            .apply_overrides(lookup(&[("HOST", "   ")]))
            .expect("overrides");
        assert!(config.host.is_none());
    }

    #[test]
    fn tcp_without_host_is_rejected() {
        let config = PrinterConfig {
            transport: TransportKind::Tcp,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn spooler_requires_queue() {
        let mut config = PrinterConfig {
            transport: TransportKind::Spooler,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.queue_name = Some("TM-T20".into());
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint().to_string(), "spooler:TM-T20");
    }

    #[test]
    fn load_partial_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("printer.json");
        std::fs::write(
            &path,
            r#"{ "columns": 48, "branding": { "business_name": "PLAZA NORTE" } }"#,
        )
        .expect("write");

        let config = PrinterConfig::load(&path).expect("load");
        assert_eq!(config.columns, 48);
        assert_eq!(config.branding.business_name, "PLAZA NORTE");
        assert_eq!(config.port, DEFAULT_TCP_PORT);
    }
}
