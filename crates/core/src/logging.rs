//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Install a formatting subscriber
///
/// `RUST_LOG` wins when set; otherwise the level follows `config.debug`.
/// Safe to call more than once: later calls are ignored.
pub fn init(config: &CoreConfig) {
    let fallback = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    tracing::info!("ctxperms logging initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = CoreConfig {
            debug: true,
            ..CoreConfig::default()
        };
        init(&config);
        init(&config);
    }
}
