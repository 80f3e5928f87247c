//! Line input for the interactive binaries.
//!
//! `next_line` yields stdin lines until stdin closes or the process is asked
//! to stop (Ctrl+C, or SIGTERM on unix). Either way the caller falls out of
//! its command loop and tears down its session before exiting.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tracing::{error, info, warn};

type Stop = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
    stop: Stop,
    stopped: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stop: Box::pin(stop_requested()),
            stopped: false,
        }
    }

    /// Next input line, or `None` once the console should stop.
    pub async fn next_line(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        tokio::select! {
            () = &mut self.stop => {
                self.stopped = true;
                info!("stop requested, shutting down");
                None
            }
            line = self.lines.next_line() => match line {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "failed to read stdin");
                    None
                }
            },
        }
    }

    /// Ends the process once teardown is done. The blocking stdin reader
    /// cannot be cancelled and would otherwise keep the runtime alive.
    pub fn exit(self) -> ! {
        std::process::exit(0)
    }
}

async fn interrupted() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn stop_requested() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                () = interrupted() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            interrupted().await;
        }
    }
}

#[cfg(not(unix))]
async fn stop_requested() {
    interrupted().await;
}
