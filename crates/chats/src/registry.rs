//! The set of currently live client handles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::{ClientHandle, ClientId};
use crate::types::Frame;

/// Outcome of fanning one frame out to the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Registry of all connected clients.
///
/// Every operation takes the same coarse lock, so a traversal never sees a
/// half-applied register or unregister, and a handle is never visited once
/// its `unregister` has returned. Membership implies the handle is alive:
/// removal always requests closure of the handle's transport.
#[derive(Debug)]
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<ClientId, Arc<ClientHandle>>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Create a handle and register it in one step.
    pub fn connect(&self) -> (Arc<ClientHandle>, mpsc::Receiver<Frame>) {
        let (handle, queue) = ClientHandle::new(self.queue_capacity);
        self.register(&handle);
        (handle, queue)
    }

    /// Add a handle. No-op if it is already present or has begun closing.
    pub fn register(&self, handle: &Arc<ClientHandle>) -> bool {
        let mut clients = self.clients.lock();
        if clients.contains_key(&handle.id()) || !handle.mark_registered() {
            return false;
        }
        clients.insert(handle.id(), Arc::clone(handle));
        info!(client_id = %handle.id(), clients = clients.len(), "client registered");
        true
    }

    /// Remove a handle and request its closure. Safe to call repeatedly and
    /// for handles that were never registered.
    pub fn unregister(&self, handle: &ClientHandle) -> bool {
        let mut clients = self.clients.lock();
        let removed = clients.remove(&handle.id()).is_some();
        handle.begin_close();
        if removed {
            info!(client_id = %handle.id(), clients = clients.len(), "client unregistered");
        }
        removed
    }

    /// Visit a consistent snapshot of the membership. Read-only; for
    /// inspection and tests. Broadcasting goes through [`Self::fan_out`],
    /// which removes failed members under the same lock.
    ///
    /// The visitor runs under the registry lock and must not call back into
    /// the registry.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<ClientHandle>),
    {
        let clients = self.clients.lock();
        for handle in clients.values() {
            visitor(handle);
        }
    }

    /// Queue `frame` on every member. Members whose queue is full or closed
    /// are removed and closed within the same critical section, so no later
    /// fan-out can reach them.
    pub fn fan_out(&self, frame: &Frame) -> FanOut {
        let mut outcome = FanOut::default();
        let mut clients = self.clients.lock();

        clients.retain(|id, handle| match handle.try_enqueue(Arc::clone(frame)) {
            Ok(()) => {
                outcome.delivered += 1;
                true
            }
            Err(reason) => {
                warn!(client_id = %id, %reason, "dropping client that cannot keep up");
                handle.begin_close();
                outcome.dropped += 1;
                false
            }
        });

        outcome
    }

    /// Unregister and close everyone. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.clients.lock().drain().map(|(_, handle)| handle).collect();
        for handle in &drained {
            handle.begin_close();
        }
        if !drained.is_empty() {
            info!(clients = drained.len(), "closed all clients");
        }
        drained.len()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
