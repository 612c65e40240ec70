//! Logging integration for the urlmap engine.
//!
//! Provides a helper for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings). The engine itself only emits
//! `debug!`/`trace!` events (index population, resolution attempts); hosts
//! that embed it decide whether and how those are rendered.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level filter is read from `settings.log_level`. In debug mode a
/// pretty, human-readable format is used; otherwise a structured JSON format.
/// If a subscriber is already installed, this is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_does_not_panic() {
        setup_logging(&Settings::default());
        // Installing twice must be harmless.
        setup_logging(&Settings {
            debug: false,
            log_level: "warn".to_string(),
        });
    }

    #[test]
    fn test_setup_logging_bad_filter_falls_back() {
        setup_logging(&Settings {
            debug: true,
            log_level: "not a ==== filter".to_string(),
        });
    }
}
