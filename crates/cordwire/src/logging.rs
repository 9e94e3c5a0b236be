//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Installs a `fmt` subscriber for the whole process.
///
/// `RUST_LOG` wins when it is set; otherwise the level is `debug` for a
/// verbose client and `info` for a quiet one. Returns `false` if a global
/// subscriber was already installed, which is harmless.
pub fn init(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true), "debug");
        assert_eq!(default_directive(false), "info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        assert!(!init(true));
    }
}
