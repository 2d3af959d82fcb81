use std::io::Write;

use anyhow::Result;
use env_logger::fmt::Formatter;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::Record;

use super::command::{Cli, LogFormat};

/// Installs the global logger.
///
/// With `--progress` the logger is routed through `multi` so records do not tear
/// the progress bars; the returned handle is then the one to draw bars on.
pub fn init<'a>(cli: &Cli, multi: &'a MultiProgress) -> Result<Option<&'a MultiProgress>> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_secs();
            // Library targets only matter when tracing the burst builders.
            builder.format_target(cli.loglevel.to_level_filter() >= log::LevelFilter::Debug);
        }
        LogFormat::Json => {
            builder.format(write_json_record);
        }
    }

    if cli.progress {
        LogWrapper::new(multi.clone(), builder.build()).try_init()?;
        Ok(Some(multi))
    } else {
        builder.try_init()?;
        Ok(None)
    }
}

fn write_json_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let ts = buf.timestamp().to_string();
    writeln!(buf, "{}", json_line(&ts, record))
}

/// One JSON object per record. `{:?}` on a `str` yields a quoted, escaped string.
fn json_line(ts: &str, record: &Record) -> String {
    format!(
        "{{\"ts\":{ts:?},\"lvl\":\"{}\",\"target\":{:?},\"msg\":{:?}}}",
        record.level(),
        record.target(),
        record.args().to_string()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_records_escape_messages() {
        let line = json_line(
            "2026-01-01T00:00:00Z",
            &Record::builder()
                .level(log::Level::Warn)
                .target("iec61937::process::truehd")
                .args(format_args!("frame \"{}\" dropped", 7))
                .build(),
        );
        assert_eq!(
            line,
            r#"{"ts":"2026-01-01T00:00:00Z","lvl":"WARN","target":"iec61937::process::truehd","msg":"frame \"7\" dropped"}"#
        );
    }
}
