//! Session backend client
//!
//! The backend mints per-session room credentials:
//! - POST /api/voice/session - Create a room and a token for the user
//! - DELETE /api/voice/session/:room_name - Tear the room down

pub mod client;
pub mod messages;

pub use client::{SessionApi, SessionClient};
pub use messages::{SessionCredentials, VoiceSessionRequest};
