//! Logging setup for the `partscrape` binary and embedders.

use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at debug level
const QUIET_TARGETS: [&str; 5] = ["hyper", "hyper_util", "fantoccini", "html5ever", "selectors"];

/// Filter directives for `level`: our own targets at `level`, noisy
/// dependencies capped at warn
pub(crate) fn directives(level: &str) -> String {
    let mut directives = vec![level.to_ascii_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Installs a fmt subscriber on stderr. `RUST_LOG` wins over `level` when set.
/// Calling it again after a subscriber is installed does nothing.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cap_dependencies() {
        assert_eq!(
            directives("DEBUG"),
            "debug,hyper=warn,hyper_util=warn,fantoccini=warn,html5ever=warn,selectors=warn"
        );
    }

    #[test]
    fn init_twice_is_harmless() {
        init("info");
        init("debug");
        tracing::info!("logging initialised");
    }
}
