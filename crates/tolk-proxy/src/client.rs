use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};
use tolk_types::{Message, MessageId, MessageType, ProxyRequestPayload, ProxyRequestResponse};

use crate::pending::PendingRequests;
use crate::{ProxyChannel, ProxyError};

/// Caller side of the proxy channel
#[derive(Clone)]
pub struct ProxyClient {
    requests: AsyncSender<Message<ProxyRequestPayload>>,
    pending: Arc<PendingRequests>,
}

impl ProxyClient {
    pub fn new(requests: AsyncSender<Message<ProxyRequestPayload>>) -> Self {
        Self {
            requests,
            pending: Arc::new(PendingRequests::new()),
        }
    }

    /// Route responses coming back from the privileged side to their callers.
    /// Runs until every response sender is gone.
    pub async fn receive_responses(&self, responses: AsyncReceiver<ProxyRequestResponse>) {
        while let Ok(response) = responses.recv().await {
            let id = response.message_id.clone();
            if !self.pending.resolve(response) {
                tracing::warn!(%id, "no caller waiting for proxy response");
            }
        }
        tracing::debug!("proxy response stream closed");
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait::async_trait]
impl ProxyChannel for ProxyClient {
    async fn send(&self, payload: ProxyRequestPayload) -> Result<ProxyRequestResponse, ProxyError> {
        let id = MessageId::random();
        let response = self.pending.register(id.clone());

        tracing::debug!(%id, url = %payload.url, "sending proxy request");
        let message = Message::new(id.clone(), MessageType::ProxyRequest, payload);
        if self.requests.send(message).await.is_err() {
            self.pending.cancel(&id);
            return Err(ProxyError::ChannelClosed);
        }

        response.await.map_err(|_| ProxyError::Dropped(id))
    }
}
