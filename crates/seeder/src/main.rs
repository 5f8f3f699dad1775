mod config;
mod dispatcher;
mod logging;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use config::{Opts, SeederConfig};
use seeder_core::MembershipIndex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init_logging(opts.log_level, opts.log_file.as_deref())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .enable_io()
        .build()?;

    let token = CancellationToken::new();
    #[cfg(not(target_os = "windows"))]
    {
        let token = token.clone();
        use signal_hook::{
            consts::{SIGINT, SIGTERM},
            iterator::Signals,
        };
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        thread::spawn(move || {
            let mut cancel_triggered = false;
            for sig in signals.forever() {
                if cancel_triggered {
                    warn!(signal = sig, "forcing shutdown");
                    std::process::exit(1)
                }
                warn!(signal = sig, "shutting down gracefully");
                token.cancel();
                cancel_triggered = true;

                thread::spawn(|| {
                    thread::sleep(Duration::from_secs(5));
                    warn!("could not shut down in time, killing myself");
                    std::process::exit(1)
                });
            }
        });
    }

    let config = Arc::new(SeederConfig::from(&opts));
    let index = Arc::new(MembershipIndex::new());

    let result = rt.block_on(dispatcher::run(config, index, token.clone()));
    if let Err(e) = result.as_ref() {
        error!(error = %e, "seeder exited with error");
    }
    rt.shutdown_timeout(Duration::from_secs(1));
    match result {
        Ok(_) => std::process::exit(0),
        Err(_) => std::process::exit(1),
    }
}
