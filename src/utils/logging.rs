use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const DAEMON_PREFIX: &str = "daemon";

/// Sets up daily rolling log files in `<application_data_path>/logs`, keeping the last 5.
/// Console output goes to stderr and only when `show_std` is set, since the daemon runs
/// detached and the cli prints its own results to stdout.
pub fn enable_logging(
    prefix: &str,
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(application_data_path.join("logs"))?;

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(appender);
    let console_layer = show_std.then(|| fmt::layer().compact().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directive(
            log_level,
            std::env::var("RUST_LOG").ok(),
        )))
        .with(file_layer)
        .with(console_layer)
        .try_init()?;
    Ok(())
}

/// An explicit level wins over `RUST_LOG`. A bare level only applies to this crate, a full
/// directive such as `pomosync=trace,notify_rust=debug` is used as is.
fn filter_directive(log_level: Option<LevelFilter>, rust_log: Option<String>) -> String {
    let target = env!("CARGO_PKG_NAME").replace("-", "_");
    match (log_level, rust_log) {
        (Some(level), _) => format!("{target}={level}"),
        (None, Some(directive)) if directive.contains('=') => directive,
        (None, Some(level)) if !level.trim().is_empty() => format!("{target}={}", level.trim()),
        (None, _) => format!("{target}=debug"),
    }
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::filter_directive;

    #[test]
    fn explicit_level_wins() {
        assert_eq!(
            filter_directive(Some(LevelFilter::TRACE), Some("warn".into())),
            "pomosync=trace"
        );
    }

    #[test]
    fn rust_log_is_scoped_to_crate() {
        assert_eq!(filter_directive(None, Some("info".into())), "pomosync=info");
        assert_eq!(
            filter_directive(None, Some("pomosync=trace,zbus=warn".into())),
            "pomosync=trace,zbus=warn"
        );
        assert_eq!(filter_directive(None, None), "pomosync=debug");
        assert_eq!(filter_directive(None, Some(" ".into())), "pomosync=debug");
    }
}
