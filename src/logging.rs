use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use crate::Error;

/// How much narration the caller wants on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportVerbosity {
    Quiet,
    #[default]
    Default,
    Verbose,
}

impl ReportVerbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Warn,
            Self::Default => LevelFilter::Info,
            Self::Verbose => LevelFilter::Trace,
        }
    }
}

/// Install a terminal logger on stderr, so that [`crate::LogEventHandler`] output is visible.
///
/// Fails if a logger has already been installed.
pub fn configure_logs(verbosity: ReportVerbosity) -> Result<(), Error> {
    let mut cfg = ConfigBuilder::new();
    cfg.set_target_level(LevelFilter::Error);

    //the keyframe noise statistics are only interesting when debugging a camera.
    if verbosity != ReportVerbosity::Verbose {
        cfg.add_filter_ignore_str("keyframe_extraction_stats");
    }

    TermLogger::init(
        verbosity.level_filter(),
        cfg.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .map_err(|e| Error::Config(format!("logger failed to initialize: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(ReportVerbosity::Quiet.level_filter(), LevelFilter::Warn);
        assert_eq!(ReportVerbosity::default().level_filter(), LevelFilter::Info);
        assert_eq!(ReportVerbosity::Verbose.level_filter(), LevelFilter::Trace);
    }
}
