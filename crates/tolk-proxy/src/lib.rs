//! Request/response channel to the privileged context that performs the
//! actual network I/O. Callers send a [`ProxyRequestPayload`] and await the
//! single response correlated by message id.

mod client;
mod pending;
mod worker;

pub use client::ProxyClient;
pub use pending::PendingRequests;
pub use worker::ProxyWorker;

use tolk_types::{MessageId, ProxyRequestPayload, ProxyRequestResponse};

/// Anything able to carry a proxied request and hand back its response
#[async_trait::async_trait]
pub trait ProxyChannel: Send + Sync {
    async fn send(&self, payload: ProxyRequestPayload) -> Result<ProxyRequestResponse, ProxyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Proxy channel closed")]
    ChannelClosed,

    #[error("Proxy response for message {0} was dropped")]
    Dropped(MessageId),
}
