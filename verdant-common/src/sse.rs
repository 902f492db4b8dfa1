//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for Verdant services.

use crate::events::EventBus;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create an SSE stream that forwards EventBus events to the client.
///
/// Each domain event is serialized as JSON with the enum variant name as
/// the SSE event name. A heartbeat comment is sent every 15 seconds so
/// proxies keep the connection open.
pub fn create_event_sse_stream(
    service_name: &'static str,
    event_bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        // Send initial connected status
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
                Ok(Ok(event)) => {
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: forwarding {} event", event.event_type());
                            yield Ok(Event::default().event(event.event_type()).data(json));
                        }
                        Err(e) => warn!("SSE: failed to serialize event: {}", e),
                    }
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!("SSE: client lagged, skipped {} events", skipped);
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                    info!("SSE: {} event stream closed", service_name);
                    break;
                }
                Err(_elapsed) => {
                    debug!("SSE: sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
