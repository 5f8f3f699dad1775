use std::io::LineWriter;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::LogLevel;

/// Builds the stdout (and optional file) `tracing` pipeline. Grounded on the
/// teacher's logging setup, trimmed of the HTTP log-streaming broadcast
/// layer, which has no counterpart in a UDP-only service.
pub fn init_logging(log_level: LogLevel, log_file: Option<&str>) -> anyhow::Result<()> {
    let console_filter = EnvFilter::builder()
        .with_default_directive(log_level.as_str().parse()?)
        .from_env()
        .context("invalid RUST_LOG value")?;

    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(console_filter));

    if let Some(log_file) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("error opening log file {log_file:?}"))?;
        let writer = std::sync::Mutex::new(LineWriter::new(file));
        let file_filter = EnvFilter::builder()
            .with_default_directive(log_level.as_str().parse()?)
            .from_env()
            .context("invalid RUST_LOG value")?;
        registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter),
            )
            .try_init()
            .context("can't init logging to file")?;
    } else {
        registry.try_init().context("can't init logging")?;
    }
    Ok(())
}
