use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};

use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use time::{
    format_description::{self, FormatItem},
    OffsetDateTime, UtcOffset,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    FmtSubscriber,
};

/// Initialize the logging system.
///
/// Events go to the standard error, or are appended to `log_file` without
/// colors when one is given.
pub fn init_logging(level: Level, log_file: Option<&Path>) -> Result<()> {
    // The offset cannot always be determined, e.g. on some Unix platforms
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let my_pretty_logger = MyPrettyLogger::new(local_offset);

    let res = match log_file {
        None => {
            let subscriber = FmtSubscriber::builder()
                .event_format(my_pretty_logger)
                .with_writer(std::io::stderr)
                .with_max_level(level)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .wrap_err("Could not create the log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not open log file {}", path.display()))?;

            tracing::subscriber::set_global_default(file_subscriber(my_pretty_logger, level, file))
        }
    };

    res.into_diagnostic()
        .wrap_err("Setting default subscriber failed")
}

/// Subscriber appending plain text events to `file`
fn file_subscriber(
    logger: MyPrettyLogger,
    level: Level,
    file: File,
) -> impl Subscriber + Send + Sync + 'static {
    // The ANSI flag must be set before replacing the event format
    FmtSubscriber::builder()
        .with_ansi(false)
        .event_format(logger)
        .with_writer(Mutex::new(file))
        .with_max_level(level)
        .finish()
}

/// Level to log at: the configured one, raised by each `-v`
pub fn effective_level(configured: Level, verbose: u8) -> Level {
    match verbose {
        0 => configured,
        1 => Level::DEBUG.max(configured),
        _ => Level::TRACE,
    }
}

/// Custom logger as the default ones are not as customizable as I want
struct MyPrettyLogger {
    offset: UtcOffset,
    time_format: Vec<FormatItem<'static>>,
}

impl MyPrettyLogger {
    fn new(offset: UtcOffset) -> Self {
        Self {
            offset,
            time_format: format_description::parse("[hour]:[minute]:[second]").unwrap(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for MyPrettyLogger
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        let now = OffsetDateTime::now_utc().to_offset(self.offset).time();
        let now = now
            .format(&self.time_format)
            .map_err(|_| std::fmt::Error)?;

        if writer.has_ansi_escapes() {
            let level = match *metadata.level() {
                Level::ERROR => metadata.level().red().to_string(),
                Level::WARN => metadata.level().yellow().to_string(),
                Level::DEBUG => metadata.level().blue().to_string(),
                Level::TRACE => metadata.level().purple().to_string(),
                _ => metadata.level().green().to_string(),
            };

            write!(&mut writer, "{} {:>5} ", now.dimmed(), level)?;
        } else {
            write!(&mut writer, "{} {:>5} ", now, metadata.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(effective_level(Level::INFO, 0), Level::INFO);
        assert_eq!(effective_level(Level::INFO, 1), Level::DEBUG);
        assert_eq!(effective_level(Level::TRACE, 1), Level::TRACE);
        assert_eq!(effective_level(Level::WARN, 2), Level::TRACE);
    }

    #[test]
    fn file_events_have_no_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ytmigrator.log");
        let file = File::create(&path).unwrap();
        let subscriber = file_subscriber(MyPrettyLogger::new(UtcOffset::UTC), Level::INFO, file);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("disk almost full");
            tracing::debug!("filtered out");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with(" WARN disk almost full\n"), "{content:?}");
        assert!(!content.contains('\x1b'));
        assert!(!content.contains("filtered out"));
    }
}
