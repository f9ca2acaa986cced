use crate::session::SessionManager;
use crate::view::SessionView;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// View of the current snapshot
    pub fn view(&self) -> SessionView {
        SessionView::from(&self.manager.snapshot())
    }
}
