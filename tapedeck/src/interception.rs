//! The process-wide interception point shared by every test in a binary.

use crate::{
    configuration::{MatchingConfiguration, Settings},
    error::Result,
    session::{SessionController, SessionMode, SessionReport},
    storage::FileStorage,
    transport::HyperTransport,
};
use lazy_static::lazy_static;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

lazy_static! {
    static ref INTERCEPTION_POINT: Arc<SessionController> = {
        let settings = Settings::from_env();

        Arc::new(SessionController::new(
            Arc::new(FileStorage::new(settings.fixtures_dir().clone())),
            Arc::new(HyperTransport::new()),
        ))
    };
    static ref EXCLUSIVE_ACCESS: Mutex<()> = Mutex::new(());
}

pub fn interception_point() -> Arc<SessionController> {
    INTERCEPTION_POINT.clone()
}

pub async fn start_session<S: Into<String>>(
    session_name: S,
    configuration: Option<MatchingConfiguration>,
) -> Result<SessionMode> {
    INTERCEPTION_POINT
        .start(session_name, configuration.unwrap_or_default())
        .await
}

pub async fn end_session() -> Result<SessionReport> {
    INTERCEPTION_POINT.end().await
}

/// Waits until no other holder uses the shared interception point. Starting a
/// session while another one is active fails, so tests sharing it take this first.
pub async fn exclusive_access() -> MutexGuard<'static, ()> {
    EXCLUSIVE_ACCESS.lock().await
}
