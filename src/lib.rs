pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod monitor;
pub mod session;
pub mod view;

pub use backend::{SessionApi, SessionClient, SessionCredentials};
pub use config::{Config, ExecutionContext};
pub use error::VoiceError;
pub use http::{create_router, AppState};
pub use media::{AudioCapture, LoopbackConnector, LoopbackOptions, RoomConnector, WavCapture};
pub use monitor::{AudioLevelMonitor, Slot};
pub use session::{ManagerOptions, SessionManager, SessionSnapshot};
pub use view::SessionView;
