//! Logging Setup
//!
//! Installs the global tracing subscriber. Output goes to stderr so command
//! output printed by the CLI stays clean on stdout. `RUST_LOG` directives
//! take precedence over the configured level.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// Level to use: debug when verbose, otherwise the configured one
pub fn effective_level(config: &LoggingConfig, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.level.to_lowercase().parse().unwrap_or(Level::INFO)
}

pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = effective_level(config, verbose);
    let format = config.format.parse().unwrap_or(LogFormat::Compact);
    init_with_writer(level, format, io::stderr)
}

fn init_with_writer<W>(level: Level, format: LogFormat, writer: W) -> Result<()>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(env_filter(level))
        .with_writer(writer);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, info};

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_effective_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "compact".to_string(),
        };
        assert_eq!(effective_level(&config, false), Level::WARN);
        assert_eq!(effective_level(&config, true), Level::DEBUG);

        let bad = LoggingConfig {
            level: "loud".to_string(),
            ..config
        };
        assert_eq!(effective_level(&bad, false), Level::INFO);
    }

    #[test]
    fn test_json_output_is_parseable() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::INFO)
            .with_writer(writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(command = "列出文件", status = "success", "Command finished");
            debug!("filtered out");
        });

        let output = writer.contents();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["fields"]["message"], "Command finished");
        assert_eq!(value["fields"]["command"], "列出文件");
        assert_eq!(value["level"], "INFO");
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_with_writer(Level::INFO, LogFormat::Compact, CaptureWriter::default());
        let second = init_with_writer(Level::INFO, LogFormat::Json, CaptureWriter::default());
        assert!(second.is_err());
    }
}
