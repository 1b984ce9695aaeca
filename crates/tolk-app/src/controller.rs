use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tolk_config::Config;
use tolk_proxy::{ProxyClient, ProxyWorker};
use tolk_types::{Message, ProxyRequestPayload, ProxyRequestResponse};

use crate::state::AppState;

/// Centralized channel management
pub struct ChannelSet {
    pub proxy_requests: (
        AsyncSender<Message<ProxyRequestPayload>>,
        AsyncReceiver<Message<ProxyRequestPayload>>,
    ),
    pub proxy_responses: (
        AsyncSender<ProxyRequestResponse>,
        AsyncReceiver<ProxyRequestResponse>,
    ),
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            proxy_requests: kanal::bounded_async(64),
            proxy_responses: kanal::bounded_async(64),
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Application controller for task spawning and lifecycle
pub struct AppController {
    channels: ChannelSet,
    proxy: ProxyClient,
    state: Arc<AppState>,
    cancel_token: CancellationToken,
}

impl AppController {
    pub fn new(config: Config) -> Self {
        let channels = ChannelSet::new();
        let proxy = ProxyClient::new(channels.proxy_requests.0.clone());
        let state = Arc::new(AppState::new(config, Arc::new(proxy.clone())));

        Self {
            channels,
            proxy,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the privileged proxy worker and the pump routing its responses
    /// back to waiting callers
    pub fn spawn_tasks(&self, worker: ProxyWorker) -> JoinSet<anyhow::Result<()>> {
        let mut tasks = JoinSet::new();

        // Proxy worker
        let requests = self.channels.proxy_requests.1.clone();
        let responses = self.channels.proxy_responses.0.clone();
        let cancel = self.cancel_token.child_token();
        tasks.spawn(async move {
            worker.run(requests, responses, cancel).await;
            Ok(())
        });

        // Response pump
        let proxy = self.proxy.clone();
        let responses = self.channels.proxy_responses.1.clone();
        let cancel = self.cancel_token.child_token();
        tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = proxy.receive_responses(responses) => {
                    tracing::warn!("proxy response pump exited");
                }
            }
            Ok(())
        });

        tasks
    }

    pub fn shutdown(&self) {
        tracing::debug!(in_flight = self.proxy.in_flight(), "shutting down");
        self.cancel_token.cancel();
    }
}
