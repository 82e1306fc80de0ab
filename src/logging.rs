//! Logger setup
//!
//! `android_logger` on Android (logcat), `env_logger` everywhere else.
//! `RUST_LOG` takes precedence over the configured default level.

use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Install the logger once; later calls are no-ops
pub fn init(default_level: &str) {
    INIT.get_or_init(|| install(default_level));
}

#[cfg(target_os = "android")]
fn install(default_level: &str) {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<log::LevelFilter>().ok())
        .or_else(|| default_level.parse().ok())
        .unwrap_or(log::LevelFilter::Info);
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag("rustjni"),
    );
}

#[cfg(not(target_os = "android"))]
fn install(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    // Another logger may already be installed by an embedding host
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
