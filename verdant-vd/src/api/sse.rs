//! Server-Sent Events endpoint for pipeline events

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;
use verdant_common::sse::create_event_sse_stream;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_event_sse_stream("verdant-vd", &state.event_bus)
}
