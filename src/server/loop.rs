// Server loop module
// Accepts connections until shutdown is signalled, then drains the active ones

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop on the current `LocalSet`.
///
/// Returns once `shutdown` is notified and the in-flight connections have
/// finished or `performance.shutdown_grace` seconds have passed.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = shutdown.notified() => break,
        }
    }

    // stop accepting before draining
    drop(listener);
    drain_connections(&state).await;
}

async fn drain_connections(state: &AppState) {
    logger::log_shutdown(state.active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let drained = tokio::time::timeout(grace, async {
        while state.active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    match drained {
        Ok(()) => logger::log_info("All connections closed, shutting down"),
        Err(_) => logger::log_warning(&format!(
            "Shutdown grace of {}s elapsed with {} connection(s) still open",
            grace.as_secs(),
            state.active_connections.load(Ordering::SeqCst)
        )),
    }
}
