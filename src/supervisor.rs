use anyhow::{bail, Context, Result};
use futures::future::select_all;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Run transport tasks until `signal` fires or one of them exits
///
/// Either way every remaining task is told to stop through `shutdown` and
/// awaited. Returns an error if any task failed or stopped on its own.
pub async fn supervise(
    mut servers: Vec<JoinHandle<Result<()>>>,
    signal: impl Future<Output = std::io::Result<()>>,
    shutdown: watch::Sender<bool>,
) -> Result<()> {
    let mut failed = false;

    if !servers.is_empty() {
        let stopped_early = tokio::select! {
            result = signal => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Shutting down");
                None
            }
            (result, index, _) = select_all(servers.iter_mut()) => Some((index, result)),
        };

        if let Some((index, result)) = stopped_early {
            servers.remove(index);
            if !report(result) {
                warn!("Transport stopped unexpectedly");
            }
            failed = true;
            info!("Shutting down remaining transports");
        }
    }

    let _ = shutdown.send(true);
    for server in servers {
        failed |= report(server.await);
    }

    if failed {
        bail!("Voice channel stopped after a transport failure");
    }
    Ok(())
}

/// Log a finished transport task; true if it failed
fn report(result: Result<Result<()>, JoinError>) -> bool {
    match result {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            error!("Transport stopped with error: {:#}", e);
            true
        }
        Err(e) => {
            error!("Transport task panicked: {}", e);
            true
        }
    }
}
