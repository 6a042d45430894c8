use tracing_subscriber::{fmt, EnvFilter};

/// Maps `-v` repeat count to a default filter, the way `pens-catalog_1a`'s
/// `enable_logging` maps `-v` to a `LevelFilter`.
pub fn init_logging(verbosity: u8) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        fmt().with_env_filter(filter).with_target(false).compact().init();
        return;
    }

    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::new(format!("{default_level},storagemgr={default_level}"));

    fmt().with_env_filter(filter).with_target(false).compact().init();
}
