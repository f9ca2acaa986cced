use super::state::AppState;
use crate::view::SessionView;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::stream::{self, Stream};
use tracing::{debug, info};

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.view())
}

/// POST /session/connect
pub async fn connect(State(state): State<AppState>) -> Json<SessionView> {
    info!("Connect requested");
    state.manager.connect().await;
    Json(state.view())
}

/// POST /session/disconnect
pub async fn disconnect(State(state): State<AppState>) -> Json<SessionView> {
    info!("Disconnect requested");
    state.manager.disconnect().await;
    Json(state.view())
}

/// POST /session/toggle
/// Start or stop recording (connects first when there is no session)
pub async fn toggle_recording(State(state): State<AppState>) -> Json<SessionView> {
    info!("Recording toggle requested");
    state.manager.toggle_recording().await;
    Json(state.view())
}

/// GET /session/events
/// Server-sent stream of views, starting with the current one
pub async fn session_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.manager.watch();
    debug!("Session event stream opened");

    let views = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let view = SessionView::from(&*rx.borrow_and_update());
        let event = Event::default().event("session").json_data(&view);
        Some((event, (rx, false)))
    });

    Sse::new(views).keep_alive(KeepAlive::default())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
