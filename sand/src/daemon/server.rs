// Accept loop: one task per client connection, all sharing one registry
// Stops accepting when the shutdown future resolves; in-flight sessions are aborted

use crate::daemon::session::serve_connection;
use crate::timers::registry::TimerRegistry;
use std::future::Future;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// Serve clients on `listener` until `shutdown` completes.
///
/// The listener is dropped (closing its descriptor) before this returns.
pub async fn serve<F>(listener: UnixListener, registry: Arc<TimerRegistry>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut sessions = JoinSet::new();
    let mut next_session_id: u64 = 0;

    info!("starting accept loop");
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        next_session_id += 1;
                        let registry = Arc::clone(&registry);
                        let span = info_span!("session", id = next_session_id);
                        sessions.spawn(
                            async move {
                                debug!("client connected");
                                match serve_connection(&registry, stream).await {
                                    Ok(()) => debug!("client disconnected"),
                                    Err(e) => warn!("Client error: {}", e),
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        warn!("Accept error: {}", e);
                    }
                }
            }

            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        warn!("Session task panicked: {}", e);
                    }
                }
            }

            _ = &mut shutdown => {
                info!(active_sessions = sessions.len(), "shutting down accept loop");
                break;
            }
        }
    }

    drop(listener);
    sessions.shutdown().await;
}
