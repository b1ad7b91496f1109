//! Server-side handle for one live connection.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::Frame;

/// Unique client identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0.simple())
    }
}

/// Lifecycle of a handle. Moves forward only; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ClientState {
    Connecting = 0,
    Registered = 1,
    Unregistering = 2,
    Closed = 3,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Connecting,
            1 => ClientState::Registered,
            2 => ClientState::Unregistering,
            _ => ClientState::Closed,
        }
    }
}

/// Why a frame could not be queued for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The outbound queue is at capacity; the client is not keeping up.
    Full,
    /// The handle is closing or its delivery loop is gone.
    Closed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full => f.write_str("outbound queue full"),
            EnqueueError::Closed => f.write_str("client closed"),
        }
    }
}

/// One live connection: a bounded outbound queue plus a one-shot close signal.
///
/// The transport itself is held by the connection's delivery loop, which is
/// the only place it gets closed. Everyone else asks for closure through
/// [`ClientHandle::begin_close`], which fires at most once.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    outbound: mpsc::Sender<Frame>,
    state: AtomicU8,
    shutdown: CancellationToken,
}

impl ClientHandle {
    /// Create a handle in the `Connecting` state along with the receiving
    /// end of its queue.
    pub fn new(queue_capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (outbound, queue) = mpsc::channel(queue_capacity.max(1));
        let handle = Arc::new(Self {
            id: ClientId::new(),
            outbound,
            state: AtomicU8::new(ClientState::Connecting as u8),
            shutdown: CancellationToken::new(),
        });
        (handle, queue)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closing(&self) -> bool {
        self.state() >= ClientState::Unregistering
    }

    /// Queue a frame without waiting.
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), EnqueueError> {
        if self.is_closing() {
            return Err(EnqueueError::Closed);
        }
        self.outbound.try_send(frame).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Resolves once closure has been requested.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// `Connecting -> Registered`. Fails for any other starting state.
    pub(crate) fn mark_registered(&self) -> bool {
        self.state
            .compare_exchange(
                ClientState::Connecting as u8,
                ClientState::Registered as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Request closure. Returns `true` only for the call that made the
    /// transition; later calls are no-ops.
    pub(crate) fn begin_close(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= ClientState::Unregistering as u8 {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                ClientState::Unregistering as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.shutdown.cancel();
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Called by the delivery loop once the transport is shut.
    pub(crate) fn finish_close(&self) {
        self.state
            .store(ClientState::Closed as u8, Ordering::Release);
        self.shutdown.cancel();
    }
}
