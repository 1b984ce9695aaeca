use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tolk_types::{
    ErrorPayload, Message, MessageReply, MessageType, ProxyRequestPayload,
    SaveToHistoryPayload, TranslateWithVendorPayload,
};

use crate::state::AppState;

/// Message host loop: one json [`Message`] per input line, one [`MessageReply`]
/// per output line for every message that carried an id.
///
/// Messages are handled concurrently, so replies may come back out of order.
/// Once the input ends, replies still in flight are written before returning.
pub async fn event_loop<R, W>(
    state: Arc<AppState>,
    input: R,
    mut output: W,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let (reply_tx, reply_rx) = kanal::bounded_async::<MessageReply>(64);

    tracing::info!("[EVENT_LOOP] Starting message host");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("[EVENT_LOOP] Cancelled");
                return Ok(());
            }
            reply = reply_rx.recv() => {
                // reply_tx is still held here, so the channel cannot be closed
                if let Ok(reply) = reply {
                    write_reply(&mut output, &reply).await?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }

                let message = match serde_json::from_str::<Message>(&line) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!("[EVENT_LOOP] Invalid message: {}", e);
                        let error = ErrorPayload::new(0, format!("Invalid message: {e}"));
                        write_reply(&mut output, &MessageReply::error(None, error)).await?;
                        continue;
                    }
                };

                let state = state.clone();
                let reply_tx = reply_tx.clone();
                tokio::spawn(async move {
                    if let Some(reply) = handle_message(state, message).await
                        && reply_tx.send(reply).await.is_err()
                    {
                        tracing::warn!("[EVENT_LOOP] Reply dropped, host loop is gone");
                    }
                });
            }
        }
    }

    tracing::info!("[EVENT_LOOP] Input closed, draining replies");
    drop(reply_tx);
    while let Ok(reply) = reply_rx.recv().await {
        write_reply(&mut output, &reply).await?;
    }

    Ok(())
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &MessageReply) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}

/// Handle one message. Returns the reply to send back, `None` when the message had no id.
pub async fn handle_message(state: Arc<AppState>, message: Message) -> Option<MessageReply> {
    let Message { id, kind, payload } = message;
    tracing::debug!(?id, ?kind, "handling message");

    let result = match kind {
        MessageType::ProxyRequest => proxy_request(&state, payload).await,
        MessageType::TranslateWithVendor => translate_with_vendor(&state, payload).await,
        MessageType::SaveToHistory => save_to_history(&state, payload),
        MessageType::GetSelectedText | MessageType::TranslateFullPage => Err(ErrorPayload::new(
            0,
            format!("{kind:?} is handled by the page context"),
        )),
    };

    if let Err(error) = &result {
        tracing::debug!(?id, ?kind, status = error.status_code, "message failed: {}", error.message);
    }

    let id = id?;
    Some(match result {
        Ok(data) => MessageReply::data(Some(id), data),
        Err(error) => MessageReply::error(Some(id), error),
    })
}

fn decode<P: DeserializeOwned>(payload: Option<Value>) -> Result<P, ErrorPayload> {
    serde_json::from_value(payload.unwrap_or(Value::Null))
        .map_err(|e| ErrorPayload::new(400, format!("Invalid payload: {e}")))
}

async fn proxy_request(state: &AppState, payload: Option<Value>) -> Result<Value, ErrorPayload> {
    let payload: ProxyRequestPayload = decode(payload)?;

    let response = state
        .channel
        .send(payload)
        .await
        .map_err(|e| ErrorPayload::new(0, e.to_string()))?;

    match response.error {
        Some(error) => Err(error),
        None => Ok(response.data.unwrap_or(Value::Null)),
    }
}

async fn translate_with_vendor(state: &AppState, payload: Option<Value>) -> Result<Value, ErrorPayload> {
    let TranslateWithVendorPayload {
        vendor,
        text,
        from,
        to,
    } = decode(payload)?;

    let translation = state
        .translate(&vendor, text, from, to)
        .await
        .map_err(|e| e.to_payload())?;

    serde_json::to_value(translation).map_err(|e| ErrorPayload::new(0, e.to_string()))
}

fn save_to_history(state: &AppState, payload: Option<Value>) -> Result<Value, ErrorPayload> {
    let SaveToHistoryPayload { translation } = decode::<SaveToHistoryPayload<Value>>(payload)?;

    let kept = state.history.save(translation);
    Ok(Value::from(kept))
}
