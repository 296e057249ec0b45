use actix_web::web;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

use super::sse_adapter::SseAdapter;
use crate::error::AppError;
use crate::models::stream_event::{StreamEvent, Usage};

/// Formats one client-facing SSE frame: `data: <json>\n\n`.
pub fn frame(event: &StreamEvent) -> web::Bytes {
    web::Bytes::from(format!(
        "data: {}\n\n",
        serde_json::to_string(event).unwrap()
    ))
}

/// Translates one upstream streaming completion into the three-event
/// client protocol.
///
/// Upstream `content_block_delta` events become `delta` frames in arrival
/// order, with no buffering or reordering. Usage accounting is absorbed
/// from `message_start`/`message_delta`, and `message_stop` (or a clean
/// end of the upstream stream) produces the single `done` frame. Any
/// upstream failure, including one that arrives after deltas were already
/// flushed, produces the single `error` frame instead. After either
/// terminal frame the stream is fused; dropping it drops the underlying
/// HTTP stream and with it the upstream request.
pub struct RelayStream<S>
where
    S: Stream<Item = Result<web::Bytes, AppError>>,
{
    upstream: Pin<Box<SseAdapter<S>>>,
    request_id: String,
    usage: Usage,
    terminal_sent: bool,
}

impl<S> RelayStream<S>
where
    S: Stream<Item = Result<web::Bytes, AppError>> + Send + 'static,
{
    pub fn new(stream: S, request_id: String) -> Self {
        RelayStream {
            upstream: Box::pin(SseAdapter::new(stream)),
            request_id,
            usage: Usage::default(),
            terminal_sent: false,
        }
    }

    fn terminal(&mut self, event: StreamEvent) -> Poll<Option<Result<web::Bytes, AppError>>> {
        self.terminal_sent = true;
        Poll::Ready(Some(Ok(frame(&event))))
    }

    fn absorb_usage(&mut self, usage: &Value) {
        if let Some(v) = usage.get("input_tokens").and_then(Value::as_i64) {
            self.usage.input_tokens = v;
        }
        if let Some(v) = usage.get("output_tokens").and_then(Value::as_i64) {
            self.usage.output_tokens = v;
        }
        if let Some(v) = usage
            .get("cache_creation_input_tokens")
            .and_then(Value::as_i64)
        {
            self.usage.cache_creation_input_tokens = Some(v);
        }
        if let Some(v) = usage.get("cache_read_input_tokens").and_then(Value::as_i64) {
            self.usage.cache_read_input_tokens = Some(v);
        }
    }
}

impl<S> Stream for RelayStream<S>
where
    S: Stream<Item = Result<web::Bytes, AppError>> + Send + 'static,
{
    type Item = Result<web::Bytes, AppError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Exactly one terminal frame per stream, nothing after it.
        if this.terminal_sent {
            return Poll::Ready(None);
        }

        loop {
            match this.upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let value = match serde_json::from_str::<Value>(&event.data) {
                        Ok(value) => value,
                        Err(e) => {
                            debug!(
                                request_id = %this.request_id,
                                event_type = %event.event_type,
                                "skipping undecodable upstream event: {}", e
                            );
                            continue;
                        }
                    };

                    if let Some(error_obj) = value.get("error") {
                        let message = error_obj
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("upstream error")
                            .to_string();
                        error!(request_id = %this.request_id, "upstream error event: {}", message);
                        return this.terminal(StreamEvent::Error { error: message });
                    }

                    match value.get("type").and_then(Value::as_str) {
                        Some("content_block_delta") => {
                            if let Some(text) = value.pointer("/delta/text").and_then(Value::as_str)
                            {
                                return Poll::Ready(Some(Ok(frame(&StreamEvent::Delta {
                                    text: text.to_string(),
                                }))));
                            }
                            // non-text delta, nothing to forward
                        }
                        Some("message_start") => {
                            if let Some(usage) = value.pointer("/message/usage") {
                                this.absorb_usage(usage);
                            }
                        }
                        Some("message_delta") => {
                            if let Some(usage) = value.get("usage") {
                                this.absorb_usage(usage);
                            }
                        }
                        Some("message_stop") => {
                            debug!(
                                request_id = %this.request_id,
                                input_tokens = this.usage.input_tokens,
                                output_tokens = this.usage.output_tokens,
                                "upstream stream completed"
                            );
                            let usage = this.usage.clone();
                            return this.terminal(StreamEvent::Done { usage });
                        }
                        // ping, content_block_start, content_block_stop
                        _ => {}
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    error!(request_id = %this.request_id, "upstream stream failed: {}", e);
                    return this.terminal(StreamEvent::Error {
                        error: e.to_string(),
                    });
                }
                Poll::Ready(None) => {
                    // Upstream closed without message_stop; still terminate
                    // cleanly with what was accounted so far.
                    let usage = this.usage.clone();
                    return this.terminal(StreamEvent::Done { usage });
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
