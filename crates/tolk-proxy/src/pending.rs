use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tolk_types::{MessageId, ProxyRequestResponse};

/// Correlation table of requests waiting for their response.
/// Each id resolves at most once; the entry is removed on resolution.
#[derive(Default)]
pub struct PendingRequests {
    waiting: Mutex<HashMap<MessageId, oneshot::Sender<ProxyRequestResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: MessageId) -> oneshot::Receiver<ProxyRequestResponse> {
        let (tx, rx) = oneshot::channel();
        if self.waiting().insert(id.clone(), tx).is_some() {
            tracing::warn!(%id, "replaced a pending proxy request with the same id");
        }
        rx
    }

    /// Hand the response to its waiter. Returns false when nobody is waiting
    /// for this id anymore (already resolved, cancelled or never sent).
    pub fn resolve(&self, response: ProxyRequestResponse) -> bool {
        let Some(tx) = self.waiting().remove(&response.message_id) else {
            return false;
        };
        tx.send(response).is_ok()
    }

    pub fn cancel(&self, id: &MessageId) {
        self.waiting().remove(id);
    }

    pub fn len(&self) -> usize {
        self.waiting().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn waiting(&self) -> MutexGuard<'_, HashMap<MessageId, oneshot::Sender<ProxyRequestResponse>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
