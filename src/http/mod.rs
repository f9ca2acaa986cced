//! HTTP view server for a presentation front-end
//!
//! This module exposes one session manager over REST:
//! - GET /session - Current view
//! - GET /session/events - Server-sent view updates
//! - POST /session/connect - Create and join a session
//! - POST /session/disconnect - Leave and end the session
//! - POST /session/toggle - Start or stop recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
