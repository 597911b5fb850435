//! Server-Sent Events framing for session runs.
//!
//! Each [`WorkflowEvent`] becomes one SSE event whose name is the event name
//! and whose data is a single line of JSON. Streams send a keep-alive comment
//! every 15 seconds.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::Stream;

use mealflow_core::emitter::EventStream;
use mealflow_types::event::WorkflowEvent;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert one workflow event into an SSE event.
///
/// A body that fails to serialize becomes an `error` event, which also ends
/// the stream.
pub fn to_sse_event(event: &WorkflowEvent) -> (Event, bool) {
    match event.body() {
        Ok(body) => (Event::default().event(event.name()).data(body), event.is_terminal()),
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "failed to encode event");
            let body = serde_json::json!({ "message": format!("failed to encode {} event: {e}", event.name()) });
            (Event::default().event("error").data(body.to_string()), true)
        }
    }
}

/// Wrap a run's event stream as an SSE response.
pub fn sse_response(mut events: EventStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            let (frame, last) = to_sse_event(&event);
            yield Ok::<_, Infallible>(frame);
            if last {
                break;
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
