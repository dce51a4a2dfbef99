//! Per-connection handler: framing, routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket handshake within `handshake_timeout`
//!   2. Create the connection's [`Peer`] and spawn a writer task that
//!      drains its outbound channel into the socket
//!   3. Loop: receive frames → [`Router::handle`]
//!   4. Stop the writer and run the router's disconnect hook
//!
//! A connection is closed as idle only when no frame has moved in either
//! direction for `idle_timeout` and it is not in a room. Spectators and
//! waiting players are allowed to sit silent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arcade_protocol::{Codec, ServerMessage};
use arcade_session::Peer;
use arcade_transport::{Connection, ConnectionId, Frame, Incoming, IncomingWebSocket, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{ArcadeError, Router};

/// Drop guard that runs the disconnect hook when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async hook.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    router: Arc<Router<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conn_id = self.conn_id;
        let router = Arc::clone(&self.router);
        runtime.spawn(async move {
            router.disconnect(conn_id).await;
            debug!(%conn_id, "disconnect hook finished");
        });
    }
}

/// When a frame last moved in either direction.
struct Activity {
    origin: Instant,
    since_origin_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            since_origin_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let ms = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.since_origin_ms.store(ms, Ordering::Relaxed);
    }

    fn last(&self) -> Instant {
        self.origin + Duration::from_millis(self.since_origin_ms.load(Ordering::Relaxed))
    }
}

/// Per-connection time limits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub handshake: Duration,
    pub idle: Duration,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: IncomingWebSocket,
    router: Arc<Router<C>>,
    limits: Limits,
) -> Result<(), ArcadeError> {
    let addr = incoming.peer_addr();
    let conn = Arc::new(incoming.handshake(limits.handshake).await?);
    let conn_id = conn.id();
    info!(%conn_id, %addr, "connection opened");

    let (peer, outbound) = Peer::channel(conn_id);
    let _guard = DisconnectGuard {
        conn_id,
        router: Arc::clone(&router),
    };
    let activity = Arc::new(Activity::new());
    let writer = spawn_writer(Arc::clone(&conn), Arc::clone(&router), outbound, Arc::clone(&activity));

    let result = read_loop(conn.as_ref(), &router, &peer, &activity, limits.idle).await;

    // Dropping the receiver marks the peer closed for rooms and queues.
    writer.abort();
    result
}

async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    router: &Router<C>,
    peer: &Peer,
    activity: &Activity,
    idle_timeout: Duration,
) -> Result<(), ArcadeError> {
    let conn_id = conn.id();
    loop {
        let deadline = activity.last() + idle_timeout;
        // `None` means the idle deadline passed first.
        let received = tokio::select! {
            frame = conn.recv() => Some(frame?),
            () = tokio::time::sleep_until(deadline) => None,
        };
        match received {
            Some(Some(Frame::Text(text))) => {
                activity.touch();
                router.handle(peer, &text).await;
            }
            Some(Some(Frame::Keepalive)) => activity.touch(),
            Some(None) => {
                info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            None if activity.last() + idle_timeout > Instant::now() => {}
            None if router.manager().room_of(conn_id).await.is_some() => activity.touch(),
            None => {
                info!(%conn_id, idle_ms = idle_timeout.as_millis() as u64, "connection idle, closing");
                if let Err(err) = conn.close().await {
                    debug!(%conn_id, %err, "close after idle failed");
                }
                return Ok(());
            }
        }
    }
}

/// Forwards everything sent to the peer onto the socket, in order.
fn spawn_writer<C: Codec>(
    conn: Arc<WebSocketConnection>,
    router: Arc<Router<C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    activity: Arc<Activity>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let conn_id = conn.id();
        while let Some(msg) = outbound.recv().await {
            let text = match router.codec().encode(&msg) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%conn_id, %err, "dropping unencodable message");
                    continue;
                }
            };
            if let Err(err) = conn.send(&text).await {
                debug!(%conn_id, %err, "send failed, stopping writer");
                break;
            }
            activity.touch();
        }
    })
}
