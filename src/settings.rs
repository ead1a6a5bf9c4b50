//! Application settings, read from TOML.
//!
//! Every section and field has a default, so an empty file is valid:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! server_header = true
//!
//! [routing]
//! host_matching = false
//! auto_options = true
//! reverse_hooks = false
//!
//! [logging]
//! filter = "info,bough=debug"
//! format = "compact"
//! ansi = true
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub routing: RoutingSettings,
    pub logging: LogSettings,
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and validates a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.server.bind_addr()?;
        if self.logging.filter.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "logging.filter",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// `host:port` to listen on.
    pub bind: String,
    /// Sends `Server` and `X-Powered-By` headers.
    pub server_header: bool,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind.parse().map_err(|e: std::net::AddrParseError| SettingsError::Invalid {
            field: "server.bind",
            reason: e.to_string(),
        })
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4444".into(),
            server_header: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingSettings {
    /// Compare request hosts against blueprint hosts. Turned on anyway as
    /// soon as one blueprint declares a host.
    pub host_matching: bool,
    /// Answer `OPTIONS` on known paths with `204` and an `Allow` header.
    pub auto_options: bool,
    /// Tree-wide default for [`Blueprint::reverse_hooks`](crate::Blueprint::reverse_hooks).
    pub reverse_hooks: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            host_matching: false,
            auto_options: true,
            reverse_hooks: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Full,
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:4444");
        assert!(settings.server.server_header);
        assert!(settings.routing.auto_options);
        assert!(!settings.routing.host_matching);
        assert_eq!(settings.logging.format, LogFormat::Full);
    }

    #[test]
    fn sections_override_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [routing]
            reverse_hooks = true

            [logging]
            format = "pretty"
            ansi = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.bind_addr().unwrap().port(), 8080);
        assert!(settings.routing.reverse_hooks);
        assert_eq!(settings.logging.format, LogFormat::Pretty);
        assert!(!settings.logging.ansi);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Settings::from_toml_str("[server]\nbind = \"nope\""),
            Err(SettingsError::Invalid { field: "server.bind", .. }),
        ));
        assert!(matches!(
            Settings::from_toml_str("[routing]\nunknown = 1"),
            Err(SettingsError::Parse(_)),
        ));
        assert!(matches!(
            Settings::from_toml_str("[logging]\nformat = \"json\""),
            Err(SettingsError::Parse(_)),
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Settings::load("/definitely/not/here.toml"),
            Err(SettingsError::Io(_)),
        ));
    }
}
