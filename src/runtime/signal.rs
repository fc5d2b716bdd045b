//! Ctrl-C handling.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::driver::ShutdownFlag;

/// Raise `flag` on the first Ctrl-C. Must be called from within a tokio runtime.
pub fn install_ctrl_c(flag: ShutdownFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping after the current event");
                flag.cancel();
            }
            Err(e) => warn!("cannot listen for Ctrl-C: {}", e),
        }
    })
}
