//! Logging setup shared by photocopy binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "photocopy_cli=info,photocopy_io_fs=info";
const VERBOSE_LOG_FILTER: &str = "photocopy_cli=debug,photocopy_io_fs=debug";
const QUIET_LOG_FILTER: &str = "warn";

/// Console verbosity requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecLogConfig {
    pub verbose: bool,
    pub quiet: bool,
}

/// Filter directive used when `RUST_LOG` is not set.
///
/// `quiet` wins over `verbose`.
pub fn default_directive(spec_log_config: &SpecLogConfig) -> &'static str {
    if spec_log_config.quiet {
        QUIET_LOG_FILTER
    } else if spec_log_config.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// Install a global stderr subscriber.
///
/// `RUST_LOG` takes precedence over the flags in `spec_log_config`. Fails when
/// a global subscriber is already installed.
pub fn init_logging(
    spec_log_config: &SpecLogConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(spec_log_config)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::{SpecLogConfig, default_directive};

    #[test]
    fn default_directive_follows_flags() {
        assert_eq!(
            default_directive(&SpecLogConfig::default()),
            "photocopy_cli=info,photocopy_io_fs=info"
        );
        assert_eq!(
            default_directive(&SpecLogConfig {
                verbose: true,
                quiet: false
            }),
            "photocopy_cli=debug,photocopy_io_fs=debug"
        );
        assert_eq!(
            default_directive(&SpecLogConfig {
                verbose: true,
                quiet: true
            }),
            "warn"
        );
    }
}
