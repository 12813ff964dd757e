use super::{AppState, AuthContext};
use axum::{
    extract::State,
    response::sse::{self, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

/// Server-sent change hints, filtered down to what the caller may read.
/// Lagged receivers skip the missed hints; clients refetch on the next one.
pub(super) async fn change_stream(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    let rx = state.hub.notifier().subscribe();
    let hub = state.hub.clone();
    let actor = auth.actor;
    let stream = BroadcastStream::new(rx).filter_map(move |res| {
        let hub = hub.clone();
        let actor = actor.clone();
        async move {
            let change = res.ok()?;
            if !hub.can_observe(&actor, &change.scope).await {
                return None;
            }
            let data = serde_json::to_string(&change.scope).ok()?;
            Some(Ok(sse::Event::default().event("change").data(data)))
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
