use crate::config::{Environment, LogLevel};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Identity, Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Console-only logging: pretty output in development, JSON in production.
///
/// `RUST_LOG` takes precedence; otherwise the configured level is used.
pub fn setup_logging(log_level: LogLevel, environment: Environment) {
    install_subscriber(log_level, environment, None::<Identity>);
}

/// Install the global subscriber: level filter, an optional extra layer
/// (the OpenTelemetry bridge), then the console formatter.
pub(crate) fn install_subscriber<L>(log_level: LogLevel, environment: Environment, extra: Option<L>)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(extra);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}

fn env_filter(log_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_env_filter_falls_back_to_configured_level() {
        // SAFETY: serialized with the other env-mutating tests
        unsafe { env::remove_var("RUST_LOG") };
        assert_eq!(env_filter(LogLevel::Warn).to_string(), "warn");
    }

    #[test]
    #[serial]
    fn test_rust_log_wins() {
        // SAFETY: serialized with the other env-mutating tests
        unsafe { env::set_var("RUST_LOG", "gateway=debug") };
        let filter = env_filter(LogLevel::Error);
        unsafe { env::remove_var("RUST_LOG") };
        assert_eq!(filter.to_string(), "gateway=debug");
    }
}
