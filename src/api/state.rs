use std::sync::Arc;

use tokio::sync::Mutex;

use crate::chat::SessionController;
use crate::core::AppConfig;

pub struct AppState {
    // Held only while the session is read or changed, never across an
    // upstream call
    pub controller: Arc<Mutex<SessionController>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(controller: SessionController, config: AppConfig) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            config,
        }
    }
}
