use crate::{
    configuration::MatchingConfiguration,
    data::{CaptureFile, CaptureMeta, CapturedExchange, RequestDescriptor, ResponseDescriptor},
    error::Result,
    filter, matcher,
    storage::{fixture_file_name, FixtureStorage},
};
use std::sync::Arc;
use tracing::debug;

/// Exchanges recorded during one session, on top of the ones the fixture already had.
#[derive(Debug)]
pub struct CaptureStore {
    session_name: String,
    configuration: MatchingConfiguration,
    storage: Arc<dyn FixtureStorage>,
    captured: Vec<CapturedExchange>,
    loaded: Vec<CapturedExchange>,
}

impl CaptureStore {
    pub fn new<S: Into<String>>(
        session_name: S,
        configuration: MatchingConfiguration,
        storage: Arc<dyn FixtureStorage>,
    ) -> Self {
        Self {
            session_name: session_name.into(),
            configuration,
            storage,
            captured: Vec::new(),
            loaded: Vec::new(),
        }
    }

    /// Binds the store to exchanges that are already persisted for this session.
    pub fn with_loaded(mut self, exchanges: Vec<CapturedExchange>) -> Self {
        self.loaded = exchanges;
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn file_name(&self) -> String {
        fixture_file_name(&self.session_name)
    }

    pub fn captured(&self) -> &[CapturedExchange] {
        &self.captured
    }

    pub fn loaded(&self) -> &[CapturedExchange] {
        &self.loaded
    }

    /// Finds an equivalent exchange, this session's first. Must be asked before any
    /// live call so equivalent requests are only sent once.
    pub fn try_reuse(&self, live: &RequestDescriptor) -> Option<&CapturedExchange> {
        self.captured
            .iter()
            .chain(self.loaded.iter())
            .filter(|exchange| self.configuration.accepts_status(exchange.response.status))
            .find(|exchange| matcher::matches(&exchange.request, live, &self.configuration))
    }

    /// Records the filtered exchange, unless its status is excluded. Returns what was stored.
    pub fn capture(
        &mut self,
        request: &RequestDescriptor,
        response: &ResponseDescriptor,
    ) -> Option<CapturedExchange> {
        if !self.configuration.accepts_status(response.status) {
            debug!(
                session = %self.session_name,
                status = response.status,
                "Skipping exchange with failed status"
            );
            return None;
        }

        let exchange = CapturedExchange {
            request: filter::filter_request(&self.configuration, request),
            response: filter::filter_response(&self.configuration, response),
        };
        self.captured.push(exchange.clone());

        Some(exchange)
    }

    /// Writes the previously loaded exchanges followed by this session's ones.
    /// Nothing is written when this session captured nothing.
    pub fn persist(&self) -> Result<bool> {
        if self.captured.is_empty() {
            return Ok(false);
        }

        let capture_file = CaptureFile {
            meta: CaptureMeta::now(self.session_name.as_str()),
            exchanges: self
                .loaded
                .iter()
                .chain(self.captured.iter())
                .cloned()
                .collect(),
        };
        let file_name = self.file_name();

        self.storage
            .write(&file_name, &serde_json::to_string_pretty(&capture_file)?)?;
        debug!(
            session = %self.session_name,
            file = %file_name,
            exchanges = capture_file.exchanges.len(),
            "Persisted fixture"
        );

        Ok(true)
    }

    pub fn reset(&mut self) {
        self.captured.clear();
        self.loaded.clear();
    }
}
