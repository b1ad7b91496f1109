//! Per-connection read and delivery loops.
//!
//! A session is transport agnostic: it takes any sink of outbound frames and
//! any stream of inbound text frames. The gateway adapts a WebSocket to that
//! shape; tests use plain channels.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastEngine;
use crate::client::ClientHandle;
use crate::registry::ConnectionRegistry;
use crate::types::{Frame, ServerFrame};

/// Upper bound on how long a closing transport may take to shut.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drive one live connection until either side gives up.
///
/// The client is registered before any frame is read and is unregistered
/// (and its transport closed) exactly once when the session ends, whichever
/// loop notices the failure first.
pub async fn run_session<S, R, E>(engine: Arc<BroadcastEngine>, sink: S, stream: R)
where
    S: Sink<Frame> + Send + 'static,
    S::Error: fmt::Display + Send,
    R: Stream<Item = Result<String, E>> + Send,
    E: fmt::Display + Send,
{
    let registry = Arc::clone(engine.registry());
    let (handle, queue) = registry.connect();

    let writer = tokio::spawn(deliver(
        Arc::clone(&registry),
        Arc::clone(&handle),
        queue,
        sink,
    ));

    read_frames(&engine, &handle, stream).await;
    registry.unregister(&handle);

    if let Err(error) = writer.await {
        warn!(client_id = %handle.id(), error = %error, "delivery task failed");
    }
    info!(client_id = %handle.id(), "session ended");
}

/// Drain the client's queue into its transport. The only place the
/// transport is ever closed.
async fn deliver<S>(
    registry: Arc<ConnectionRegistry>,
    handle: Arc<ClientHandle>,
    mut queue: mpsc::Receiver<Frame>,
    sink: S,
) where
    S: Sink<Frame>,
    S::Error: fmt::Display,
{
    let mut sink = pin!(sink);

    loop {
        let frame = tokio::select! {
            biased;
            _ = handle.closed() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = handle.closed() => break,
            sent = sink.send(frame) => {
                if let Err(error) = sent {
                    warn!(client_id = %handle.id(), error = %error, "write failed, dropping client");
                    registry.unregister(&handle);
                    break;
                }
            }
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => debug!(client_id = %handle.id(), error = %error, "transport close failed"),
        Err(_) => debug!(client_id = %handle.id(), "transport close timed out"),
    }
    handle.finish_close();
}

/// Feed inbound frames to the engine until the peer goes away or the
/// handle is closed from elsewhere.
async fn read_frames<R, E>(engine: &BroadcastEngine, handle: &ClientHandle, stream: R)
where
    R: Stream<Item = Result<String, E>>,
    E: fmt::Display,
{
    let mut stream = pin!(stream);

    loop {
        let next = tokio::select! {
            biased;
            _ = handle.closed() => break,
            next = stream.next() => next,
        };

        let raw = match next {
            Some(Ok(raw)) => raw,
            Some(Err(error)) => {
                info!(client_id = %handle.id(), error = %error, "read failed");
                break;
            }
            None => break,
        };

        debug!(client_id = %handle.id(), bytes = raw.len(), "frame received");

        match engine.handle_frame(&raw).await {
            Ok(_) => {}
            Err(error) if error.is_client_error() => {
                warn!(client_id = %handle.id(), error = %error, "rejected frame");
                reply_error(handle, error.to_string());
            }
            Err(error) => {
                warn!(client_id = %handle.id(), error = %error, "dropping message");
            }
        }
    }
}

/// Tell only the originating client why its frame was rejected.
fn reply_error(handle: &ClientHandle, message: String) {
    let frame = match (ServerFrame::Error { message }).encode() {
        Ok(frame) => frame,
        Err(error) => {
            warn!(error = %error, "failed to encode error frame");
            return;
        }
    };
    if let Err(reason) = handle.try_enqueue(frame) {
        debug!(client_id = %handle.id(), %reason, "error frame not queued");
    }
}
