use crate::{
    capture_store::CaptureStore,
    configuration::{MatchingConfiguration, MissPolicy},
    data::{RequestDescriptor, ResponseDescriptor},
    error::{Error, Result},
    live::{self, LiveRequest},
    playback::{self, Lookup, PlaybackEngine},
    storage::{fixture_file_name, FixtureStorage},
    transport::Transport,
};
use hyper::{Body, Request, Response};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum SessionMode {
    #[serde(rename = "record")]
    Capturing,
    #[serde(rename = "replay")]
    Playing,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Capturing => "record",
            SessionMode::Playing => "replay",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub mode: SessionMode,
    pub was_replayed: bool,
}

#[derive(Debug)]
struct ActiveSession {
    name: String,
    mode: SessionMode,
    configuration: MatchingConfiguration,
    store: CaptureStore,
    playback: Option<PlaybackEngine>,
    was_replayed: bool,
}

/// Binds record/replay sessions to an interception point.
///
/// While no session is active every call goes straight to the transport.
/// Intercepted calls are handled one at a time, so equivalent requests made
/// concurrently still reach the network only once.
#[derive(Debug)]
pub struct SessionController {
    storage: Arc<dyn FixtureStorage>,
    transport: Arc<dyn Transport>,
    session: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(storage: Arc<dyn FixtureStorage>, transport: Arc<dyn Transport>) -> Self {
        Self {
            storage,
            transport,
            session: Mutex::new(None),
        }
    }

    /// Starts recording when the session has no fixture yet, replaying otherwise.
    pub async fn start<S: Into<String>>(
        &self,
        session_name: S,
        configuration: MatchingConfiguration,
    ) -> Result<SessionMode> {
        let mut session = self.session.lock().await;

        if session.is_some() {
            return Err(Error::AlreadyActive);
        }

        let name = session_name.into();
        let file_name = fixture_file_name(&name);
        let store = CaptureStore::new(name.as_str(), configuration.clone(), self.storage.clone());

        let active = if self.storage.exists(&file_name) {
            let mut engine = PlaybackEngine::new(name.as_str(), self.storage.clone());
            let loaded = engine.load()?.exchanges.clone();

            ActiveSession {
                name,
                mode: SessionMode::Playing,
                configuration,
                store: store.with_loaded(loaded),
                playback: Some(engine),
                was_replayed: false,
            }
        } else {
            ActiveSession {
                name,
                mode: SessionMode::Capturing,
                configuration,
                store,
                playback: None,
                was_replayed: false,
            }
        };

        info!(session = %active.name, mode = active.mode.as_str(), file = %file_name, "Session started");
        let mode = active.mode;
        *session = Some(active);

        Ok(mode)
    }

    /// Ends the active session, persisting what a recording session captured.
    /// The controller is idle afterwards even when persisting fails.
    pub async fn end(&self) -> Result<SessionReport> {
        let mut active = self.session.lock().await.take().ok_or(Error::NotActive)?;

        if active.mode == SessionMode::Capturing {
            active.store.persist()?;
        }

        let report = SessionReport {
            mode: active.mode,
            was_replayed: active.was_replayed,
        };
        active.store.reset();
        info!(
            session = %active.name,
            mode = report.mode.as_str(),
            was_replayed = report.was_replayed,
            "Session ended"
        );

        Ok(report)
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn mode(&self) -> Option<SessionMode> {
        self.session.lock().await.as_ref().map(|active| active.mode)
    }

    /// Routes one outgoing call according to the active session.
    pub async fn dispatch(&self, request: RequestDescriptor) -> Result<ResponseDescriptor> {
        let mut session = self.session.lock().await;

        if session.is_none() {
            drop(session);
            return self.transport.send(&request).await;
        }
        let active = session.as_mut().ok_or(Error::NotActive)?;

        match active.mode {
            SessionMode::Capturing => self.dispatch_capturing(active, request).await,
            SessionMode::Playing => self.dispatch_playing(active, request).await,
        }
    }

    /// Intercepts a hyper request; its body is read once and stays available.
    pub async fn intercept(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut live_request = LiveRequest::new(request);
        let descriptor = live_request.descriptor().await?;
        let response = self.dispatch(descriptor).await?;

        live::into_response(&response)
    }

    async fn dispatch_capturing(
        &self,
        active: &mut ActiveSession,
        request: RequestDescriptor,
    ) -> Result<ResponseDescriptor> {
        if let Some(exchange) = active.store.try_reuse(&request) {
            debug!(session = %active.name, method = %request.method, url = %request.url, "Reusing captured exchange");
            return Ok(playback::normalize_response(&exchange.response));
        }

        let response = self.transport.send(&request).await?;
        active.store.capture(&request, &response);

        Ok(response)
    }

    async fn dispatch_playing(
        &self,
        active: &mut ActiveSession,
        request: RequestDescriptor,
    ) -> Result<ResponseDescriptor> {
        let engine = active.playback.as_mut().ok_or(Error::InvalidMode)?;

        let diagnostics = match engine.find_match(&request, &active.configuration)? {
            Lookup::Hit(exchange) => {
                active.was_replayed = true;
                debug!(session = %active.name, method = %request.method, url = %request.url, "Replaying exchange");
                return Ok(playback::normalize_response(&exchange.response));
            }
            Lookup::Miss(diagnostics) => diagnostics,
        };

        if active.configuration.miss_policy() == MissPolicy::Strict {
            return Err(Error::NoMatch(Box::new(diagnostics)));
        }

        warn!(session = %active.name, "{}", diagnostics);

        let response = self.transport.send(&request).await?;
        if let Some(exchange) = active.store.capture(&request, &response) {
            active.store.persist()?;
            engine.append(exchange);
        }

        Ok(response)
    }
}
