//! Graceful shutdown handling.

use tokio::sync::watch;

/// Exit status used when the operator interrupts a run
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Creates the channel the coordinator watches for a stop request
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// First Ctrl+C asks the crawl to stop and checkpoint. Second Ctrl+C exits
/// immediately.
pub fn setup_shutdown_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, finishing with a final checkpoint");
            tracing::warn!("Press Ctrl+C again to force quit");
            let _ = shutdown_tx.send(true);

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    });
}

pub fn is_shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolves once a stop was requested
///
/// Never resolves if the sender is gone without having asked to stop.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
