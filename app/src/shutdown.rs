use futures::stream::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;

/// Resolve once a shutdown signal (SIGTERM or SIGINT) arrives
pub async fn shutdown_signal() {
    let signals = Signals::new([SIGTERM, SIGINT]).expect("Failed to create signal handler");
    let handle = signals.handle();

    let mut signals = signals.fuse();

    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM => {
                tracing::info!("Received SIGTERM signal");
                break;
            }
            SIGINT => {
                tracing::info!("Received SIGINT signal (Ctrl+C)");
                break;
            }
            _ => unreachable!(),
        }
    }

    handle.close();
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
