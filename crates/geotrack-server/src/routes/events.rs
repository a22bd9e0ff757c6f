use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream that emits a `cycle` event with the run record
/// whenever a fetch-update-export cycle completes. Lagged receivers skip
/// missed records.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.tracker.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let record = msg.ok()?;
        let event = Event::default().event("cycle").json_data(&record).ok()?;
        Some(Ok::<Event, Infallible>(event))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
