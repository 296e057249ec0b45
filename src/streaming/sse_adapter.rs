use actix_web::web;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

use crate::error::AppError;

/// One decoded upstream SSE event.
#[derive(Debug, Clone)]
pub struct UpstreamEvent {
    pub event_type: String,
    pub data: String,
}

pin_project! {
    /// Adapter that decodes an upstream byte stream into SSE events.
    ///
    /// Wraps eventsource-stream, which buffers partial lines internally,
    /// so a `data:` frame split across two network reads still comes out
    /// as a single event.
    pub struct SseAdapter<S>
    where
        S: Stream<Item = Result<web::Bytes, AppError>>
    {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<eventsource_stream::Event, eventsource_stream::EventStreamError<std::io::Error>>> + Send>>,
        _phantom: std::marker::PhantomData<S>,
    }
}

impl<S> SseAdapter<S>
where
    S: Stream<Item = Result<web::Bytes, AppError>> + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        // eventsource-stream wants an io::Error-shaped inner error
        let mapped_stream = stream.map(|result| {
            result.map(|bytes| bytes.to_vec()).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("Stream error: {}", e))
            })
        });

        let eventsource = mapped_stream.eventsource();

        SseAdapter {
            inner: Box::pin(eventsource),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S> Stream for SseAdapter<S>
where
    S: Stream<Item = Result<web::Bytes, AppError>> + Send,
{
    type Item = Result<UpstreamEvent, AppError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                debug!(event_type = %event.event, "decoded upstream SSE event");
                Poll::Ready(Some(Ok(UpstreamEvent {
                    event_type: event.event,
                    data: event.data,
                })))
            }
            Poll::Ready(Some(Err(e))) => {
                error!("SSE decode error: {}", e);
                Poll::Ready(Some(Err(AppError::External(format!(
                    "SSE decode error: {}",
                    e
                )))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
