use crate::{
    configuration::MatchingConfiguration,
    data::{CaptureFile, CapturedExchange, Headers, RequestDescriptor, ResponseDescriptor},
    error::{Error, Result},
    filter::{self, QueryParams},
    live, matcher,
    storage::{fixture_file_name, FixtureStorage},
};
use hyper::{Body, Response};
use serde::Serialize;
use std::{fmt, sync::Arc};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(CapturedExchange),
    Miss(MismatchDiagnostics),
}

/// Serves a session's fixture file.
#[derive(Debug)]
pub struct PlaybackEngine {
    session_name: String,
    storage: Arc<dyn FixtureStorage>,
    capture_file: Option<CaptureFile>,
}

impl PlaybackEngine {
    pub fn new<S: Into<String>>(session_name: S, storage: Arc<dyn FixtureStorage>) -> Self {
        Self {
            session_name: session_name.into(),
            storage,
            capture_file: None,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Reads and parses the fixture on first use; later calls reuse it.
    pub fn load(&mut self) -> Result<&CaptureFile> {
        if self.capture_file.is_none() {
            let name = fixture_file_name(&self.session_name);
            let contents = self.storage.read(&name)?;
            let capture_file = serde_json::from_str::<CaptureFile>(&contents)
                .map_err(|source| Error::Parse { name, source })?;

            self.capture_file = Some(capture_file);
        }

        self.capture_file.as_ref().ok_or(Error::InvalidMode)
    }

    pub fn exchanges(&self) -> &[CapturedExchange] {
        self.capture_file
            .as_ref()
            .map(|file| file.exchanges.as_slice())
            .unwrap_or(&[])
    }

    /// Makes an exchange recorded mid-session replayable for the rest of it.
    pub fn append(&mut self, exchange: CapturedExchange) {
        if let Some(capture_file) = self.capture_file.as_mut() {
            capture_file.exchanges.push(exchange);
        }
    }

    pub fn find_match(
        &mut self,
        live: &RequestDescriptor,
        configuration: &MatchingConfiguration,
    ) -> Result<Lookup> {
        self.load()?;
        let candidates: Vec<&CapturedExchange> = self
            .exchanges()
            .iter()
            .filter(|exchange| configuration.accepts_status(exchange.response.status))
            .collect();

        if let Some(exchange) = candidates
            .iter()
            .find(|exchange| matcher::matches(&exchange.request, live, configuration))
        {
            return Ok(Lookup::Hit((*exchange).clone()));
        }

        Ok(Lookup::Miss(MismatchDiagnostics::new(
            &self.session_name,
            live,
            candidates.into_iter(),
            configuration,
        )))
    }
}

/// Re-serializes JSON bodies so every replay of a fixture yields identical bytes.
pub fn normalize_response(stored: &ResponseDescriptor) -> ResponseDescriptor {
    let mut response = stored.clone();

    if looks_like_json(stored) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&stored.body) {
            if let Ok(body) = serde_json::to_string(&value) {
                response.body = body;
            }
        }
    }

    response
}

pub fn build_response(stored: &ResponseDescriptor) -> Result<Response<Body>> {
    live::into_response(&normalize_response(stored))
}

fn looks_like_json(response: &ResponseDescriptor) -> bool {
    let declared = response
        .headers
        .get("content-type")
        .map(|content_type| content_type.contains("json"))
        .unwrap_or(false);
    let trimmed = response.body.trim_start();

    declared || trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// The considered view of one request. Fields the configuration ignores are absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub method: String,
    pub url: String,
    pub path: String,
    pub query: QueryParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Option<String>>,
}

impl RequestView {
    fn new(request: &RequestDescriptor, configuration: &MatchingConfiguration) -> Self {
        let url = filter::strip_excluded_query_params(configuration, &request.url);
        let path = Url::parse(&request.url)
            .map(|parsed| String::from(parsed.path()))
            .unwrap_or_else(|_| String::from(request.url.split('?').next().unwrap_or("")));

        Self {
            method: request.method.clone(),
            url,
            path,
            query: filter::considered_query_params(configuration, &request.url),
            headers: if configuration.considers_headers() {
                Some(filter::filter_request_headers(configuration, &request.headers))
            } else {
                None
            },
            body: if configuration.considers_body() {
                Some(request.body.clone())
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub method: String,
    pub url: String,
    pub path: String,
    pub query: QueryParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_length: Option<usize>,
    pub status: u16,
}

impl CandidateView {
    fn new(exchange: &CapturedExchange, configuration: &MatchingConfiguration) -> Self {
        let view = RequestView::new(&exchange.request, configuration);

        Self {
            method: view.method,
            url: view.url,
            path: view.path,
            query: view.query,
            headers: view.headers,
            body_length: view
                .body
                .map(|body| body.map(|body| body.len()).unwrap_or(0)),
            status: exchange.response.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MismatchDiagnostics {
    pub session_name: String,
    pub request: RequestView,
    pub candidates: Vec<CandidateView>,
}

impl MismatchDiagnostics {
    pub fn new<'a, I: Iterator<Item = &'a CapturedExchange>>(
        session_name: &str,
        live: &RequestDescriptor,
        candidates: I,
        configuration: &MatchingConfiguration,
    ) -> Self {
        Self {
            session_name: String::from(session_name),
            request: RequestView::new(live, configuration),
            candidates: candidates
                .map(|exchange| CandidateView::new(exchange, configuration))
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for MismatchDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No recorded exchange in session \"{}\" matches {} {} ({} candidates)\n```json\n{}\n```",
            self.session_name,
            self.request.method,
            self.request.url,
            self.candidates.len(),
            self.to_json()
        )
    }
}
