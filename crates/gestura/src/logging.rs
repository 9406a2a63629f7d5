//! Logging for the `gestura` binary.
//!
//! Diagnostics go to stderr; stdout is reserved for command output (response
//! envelopes and JSON-lines events). `RUST_LOG` replaces the `-v`/`-q`
//! derived filter when set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// Batch transitions, uploads and preparation runs.
    #[default]
    Normal,
    /// `-v`: adds recordings, skipped artifact rows and storage access.
    Verbose,
    /// `-vv`: one line per tracker frame, with source locations.
    Trace,
}

impl Verbosity {
    /// Filter directive for the crate's own targets.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "gestura=error",
            Self::Normal => "gestura=info",
            Self::Verbose => "gestura=debug",
            Self::Trace => "gestura=trace",
        }
    }

    fn shows_source(self) -> bool {
        self == Self::Trace
    }

    fn shows_target(self) -> bool {
        matches!(self, Self::Verbose | Self::Trace)
    }
}

/// The filter in effect: `env` when it parses, otherwise the verbosity's directive.
fn filter_for(verbosity: Verbosity, env: Option<&str>) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.directive()))
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init_logging(verbosity: Verbosity) {
    let env = std::env::var("RUST_LOG").ok();
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity.shows_target())
        .with_file(verbosity.shows_source())
        .with_line_number(verbosity.shows_source());

    let _ = tracing_subscriber::registry()
        .with(filter_for(verbosity, env.as_deref()))
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_target_crate() {
        assert_eq!(Verbosity::Quiet.directive(), "gestura=error");
        assert_eq!(Verbosity::default().directive(), "gestura=info");
        assert_eq!(Verbosity::Verbose.directive(), "gestura=debug");
        assert_eq!(Verbosity::Trace.directive(), "gestura=trace");
    }

    #[test]
    fn test_source_locations_only_when_tracing() {
        assert!(Verbosity::Trace.shows_source());
        assert!(!Verbosity::Verbose.shows_source());
        assert!(Verbosity::Verbose.shows_target());
        assert!(!Verbosity::Normal.shows_target());
    }

    #[test]
    fn test_env_overrides_verbosity() {
        let filter = filter_for(Verbosity::Quiet, Some("gestura::approval=trace"));
        assert_eq!(filter.to_string(), "gestura::approval=trace");

        let filter = filter_for(Verbosity::Verbose, None);
        assert_eq!(filter.to_string(), "gestura=debug");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
