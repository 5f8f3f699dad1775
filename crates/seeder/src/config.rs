use std::net::IpAddr;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, author, about = "UDP peer directory service")]
pub struct Opts {
    /// Base UDP port; sockets are bound on [beginning_port, beginning_port + worker_count).
    #[arg(long, default_value_t = 9000, env = "SEEDER_BEGINNING_PORT")]
    pub beginning_port: u16,

    /// Number of UDP sockets/workers to bind (N in the affinity hash).
    #[arg(long, default_value_t = 5, env = "SEEDER_WORKER_COUNT")]
    pub worker_count: u16,

    /// Value returned to clients in HelloResponse.ping_interval_seconds.
    #[arg(long, default_value_t = 30, env = "SEEDER_CLIENT_PING_INTERVAL")]
    pub client_ping_interval: u32,

    /// Interface each UDP socket binds on.
    #[arg(long, default_value = "0.0.0.0", env = "SEEDER_BIND_ADDRESS")]
    pub bind_address: IpAddr,

    /// Console log level.
    #[arg(short = 'v', long = "log-level", value_enum, default_value = "info", env = "SEEDER_LOG_LEVEL_CONSOLE")]
    pub log_level: LogLevel,

    /// Optional file to additionally write logs to.
    #[arg(long = "log-file", env = "SEEDER_LOG_FILE")]
    pub log_file: Option<String>,
}

/// Validated configuration handed down to the dispatcher and handlers.
/// Distinct from `Opts` so downstream code never depends on `clap`.
#[derive(Debug, Clone)]
pub struct SeederConfig {
    pub beginning_port: u16,
    pub worker_count: u16,
    pub client_ping_interval: u32,
    pub bind_address: IpAddr,
}

impl From<&Opts> for SeederConfig {
    fn from(opts: &Opts) -> Self {
        Self {
            beginning_port: opts.beginning_port,
            worker_count: opts.worker_count,
            client_ping_interval: opts.client_ping_interval,
            bind_address: opts.bind_address,
        }
    }
}
