// Colored single-line formatter for development
use chrono::{SecondsFormat, Utc};
use colored::{Color, Colorize};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// `<rfc3339 timestamp> [LEVEL] target: message fields`
///
/// Colors are emitted only when the writer accepts ANSI escapes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrettyFormatter;

fn level_style(level: Level) -> (&'static str, Color) {
    match level {
        Level::TRACE => ("TRACE", Color::BrightMagenta),
        Level::DEBUG => ("DEBUG", Color::BrightBlue),
        Level::INFO => (" INFO", Color::BrightGreen),
        Level::WARN => (" WARN", Color::BrightYellow),
        Level::ERROR => ("ERROR", Color::BrightRed),
    }
}

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let (label, color) = level_style(*metadata.level());

        if writer.has_ansi_escapes() {
            write!(
                writer,
                "{} [{}] {}: ",
                timestamp.bright_black(),
                label.color(color),
                metadata.target().bright_cyan()
            )?;
        } else {
            write!(writer, "{} [{}] {}: ", timestamp, label, metadata.target())?;
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
