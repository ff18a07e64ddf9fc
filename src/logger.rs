use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber for binaries/tests embedding this
/// crate. Level filtering follows `RUST_LOG` (default: info); setting
/// `NETCHECK_LOG_JSON` switches to json output. Safe to call more than
/// once.
pub fn init_logger() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    let ret = if std::env::var("NETCHECK_LOG_JSON").is_ok() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = ret {
        tracing::debug!("tracing subscriber already installed: {}", err);
    }
}
