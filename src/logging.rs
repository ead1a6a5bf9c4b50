//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured filter:
//!
//! ```bash
//! RUST_LOG=bough=debug cargo run --example basic
//! ```

use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LogSettings};

/// Installs the global `fmt` subscriber described by `settings`.
///
/// Returns `false` when a subscriber was already installed, in which case
/// nothing changes.
pub fn init(settings: &LogSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(settings.ansi);

    let installed = match settings.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.is_ok()
}
