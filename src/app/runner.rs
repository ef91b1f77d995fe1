//! Signal-driven run loop.
//!
//! Blocks the calling thread on a current-thread Tokio runtime until Ctrl-C
//! arrives or the runner's [`CancellationToken`] is cancelled. Staying on the
//! caller's thread keeps the scoped logger installed by the bootstrap
//! sequence in effect for the whole run.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::{Application, Runner, ServiceError};

#[derive(Debug, Clone, Default)]
pub struct SignalRunner {
    shutdown: CancellationToken,
}

impl SignalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that ends the run loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Runner for SignalRunner {
    fn run(&self, _app: &dyn Application) -> Result<(), ServiceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            info!("node running, waiting for shutdown signal");
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    Ok::<(), ServiceError>(())
                }

                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("ctrl-c received, initiating shutdown");
                    Ok(())
                }
            }
        })
    }
}
