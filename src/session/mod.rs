//! Voice session management
//!
//! This module provides the `SessionManager` state machine that owns:
//! - Room credentials obtained from the session backend
//! - The room connection and its event subscription
//! - The published microphone track
//! - Both speaking-indicator monitors (user and ai)
//!
//! and publishes a read-only `SessionSnapshot` for the presentation layer.

mod agent;
mod manager;
mod state;
mod surface;

pub use agent::is_agent;
pub use manager::{ManagerOptions, SessionManager};
pub use state::{ConnectionState, RecordingState};
pub use surface::{SessionSnapshot, SessionSurface};
