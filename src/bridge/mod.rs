//! Observer → pull bridge: adapts the dispatcher's push-when-modified API
//! to the pull-based continuation style a network read loop wants
//! (specification §4.5).

use crate::dispatcher::ClientDispatcher;
use crate::protocol::ServerMessage;
use crate::store::{Observer, StoreUpdate};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A one-shot continuation invoked with the next outbound message.
pub type PullCallback = Box<dyn FnOnce(ServerMessage) + Send>;

/// Bridges a [`ClientDispatcher`]'s push notifications to a pull-based
/// consumer. At most one pull continuation is ever outstanding; `observe`
/// and `pull` both take the bridge's own lock so the "clear before invoke"
/// ordering required by the specification holds regardless of which path
/// races which.
pub struct PullBridge<M> {
    dispatcher: Arc<ClientDispatcher<M>>,
    pending_pull: Mutex<Option<PullCallback>>,
}

impl<M> PullBridge<M>
where
    M: Serialize + Send + Sync + 'static,
{
    /// Wrap a dispatcher with pull semantics.
    pub fn new(dispatcher: Arc<ClientDispatcher<M>>) -> Self {
        Self { dispatcher, pending_pull: Mutex::new(None) }
    }

    /// Forward a store update to the dispatcher; if a pull is already
    /// outstanding and the dispatcher now has something to send, clear the
    /// pending callback *before* invoking it.
    pub fn observe_update(&self, update: StoreUpdate<M>)
    where
        M: Clone,
    {
        let mut guard = self.pending_pull.lock();
        self.dispatcher.model_updated(update);
        if guard.is_some() {
            if let Some(message) = self.dispatcher.msg_for_client() {
                let callback = guard.take().expect("checked is_some above");
                drop(guard);
                callback(message);
            }
        }
    }

    /// Request the next outbound message. Invokes `cb` immediately if one
    /// is already available; otherwise stores it to be invoked by a future
    /// `observe_update`.
    ///
    /// # Panics
    /// Panics if a pull is already outstanding — calling `pull` while one
    /// is pending is a programming error per the bridge's contract.
    pub fn pull(&self, cb: PullCallback) {
        let mut guard = self.pending_pull.lock();
        assert!(guard.is_none(), "pull called while a pull is already pending");
        if let Some(message) = self.dispatcher.msg_for_client() {
            drop(guard);
            cb(message);
        } else {
            *guard = Some(cb);
        }
    }
}

impl<M> Observer<M> for PullBridge<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    fn notify(&self, update: StoreUpdate<M>) {
        self.observe_update(update);
    }
}
