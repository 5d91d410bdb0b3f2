use rategate_core::Config;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `debug` when the config asks for it, else `warn`.
pub fn init(config: &Config) {
    let fallback = if config.debug_log { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rategate_core={fallback},rategate_cli={fallback}"))
    });

    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("warning: logging disabled: {e}");
    }
}
