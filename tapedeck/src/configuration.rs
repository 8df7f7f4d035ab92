use crate::error::{Error, Result};
use serde::Deserialize;
use std::{collections::BTreeSet, convert::TryFrom, env, path::PathBuf};

pub const FIXTURES_DIR_ENV: &str = "TAPEDECK_FIXTURES_DIR";
pub const DEFAULT_FIXTURES_DIR: &str = "fixtures";

/// Which response headers end up in a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawResponseHeaderPolicy")]
pub enum ResponseHeaderPolicy {
    None,
    All,
    Only(BTreeSet<String>),
}

impl Default for ResponseHeaderPolicy {
    fn default() -> Self {
        ResponseHeaderPolicy::None
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResponseHeaderPolicy {
    Keyword(String),
    Names(Vec<String>),
}

impl TryFrom<RawResponseHeaderPolicy> for ResponseHeaderPolicy {
    type Error = String;

    fn try_from(raw: RawResponseHeaderPolicy) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawResponseHeaderPolicy::Keyword(keyword) => match keyword.as_str() {
                "none" => Ok(ResponseHeaderPolicy::None),
                "*" => Ok(ResponseHeaderPolicy::All),
                other => Err(format!(
                    "expected \"none\", \"*\" or a list of header names, got \"{}\"",
                    other
                )),
            },
            RawResponseHeaderPolicy::Names(names) => Ok(ResponseHeaderPolicy::Only(
                names.iter().map(|name| name.to_lowercase()).collect(),
            )),
        }
    }
}

/// What happens when a replayed session sees a request it has no fixture for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissPolicy {
    /// Issue the live call and append the new exchange to the fixture.
    Fallback,
    /// Fail the call with the mismatch diagnostics.
    Strict,
}

impl Default for MissPolicy {
    fn default() -> Self {
        MissPolicy::Fallback
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingConfiguration {
    include_headers: BTreeSet<String>,
    exclude_query_params: BTreeSet<String>,
    exclude_body: bool,
    record_failed_responses: bool,
    record_response_headers: ResponseHeaderPolicy,
    miss_policy: MissPolicy,
}

impl MatchingConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json<S: AsRef<str>>(json: S) -> Result<Self> {
        let file: ConfigurationFile = serde_json::from_str(json.as_ref())
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;

        Ok(file.into())
    }

    pub fn set_include_headers<S: AsRef<str>, I: IntoIterator<Item = S>>(&mut self, headers: I) {
        self.include_headers = headers
            .into_iter()
            .map(|header| header.as_ref().to_lowercase())
            .collect();
    }

    pub fn include_headers(&self) -> &BTreeSet<String> {
        &self.include_headers
    }

    pub fn set_exclude_query_params<S: Into<String>, I: IntoIterator<Item = S>>(
        &mut self,
        params: I,
    ) {
        self.exclude_query_params = params.into_iter().map(Into::into).collect();
    }

    pub fn exclude_query_params(&self) -> &BTreeSet<String> {
        &self.exclude_query_params
    }

    pub fn is_query_param_excluded(&self, name: &str) -> bool {
        self.exclude_query_params.contains(name)
    }

    pub fn set_exclude_body(&mut self, value: bool) {
        self.exclude_body = value;
    }

    pub fn exclude_body(&self) -> bool {
        self.exclude_body
    }

    pub fn set_record_failed_responses(&mut self, value: bool) {
        self.record_failed_responses = value;
    }

    pub fn record_failed_responses(&self) -> bool {
        self.record_failed_responses
    }

    pub fn set_record_response_headers(&mut self, policy: ResponseHeaderPolicy) {
        self.record_response_headers = match policy {
            ResponseHeaderPolicy::Only(names) => ResponseHeaderPolicy::Only(
                names.iter().map(|name| name.to_lowercase()).collect(),
            ),
            other => other,
        };
    }

    pub fn record_response_headers(&self) -> &ResponseHeaderPolicy {
        &self.record_response_headers
    }

    pub fn set_miss_policy(&mut self, policy: MissPolicy) {
        self.miss_policy = policy;
    }

    pub fn miss_policy(&self) -> MissPolicy {
        self.miss_policy
    }

    /// Headers take part in matching only when at least one is named.
    pub fn considers_headers(&self) -> bool {
        !self.include_headers.is_empty()
    }

    pub fn considers_body(&self) -> bool {
        !self.exclude_body
    }

    /// Responses outside `[200, 400)` are kept only when failed responses are recorded.
    pub fn accepts_status(&self, status: u16) -> bool {
        self.record_failed_responses || (200..400).contains(&status)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ConfigurationFile {
    include_headers: Vec<String>,
    exclude_query_params: Vec<String>,
    exclude_body: bool,
    record_failed_responses: bool,
    record_response_headers: ResponseHeaderPolicy,
    miss_policy: MissPolicy,
}

impl From<ConfigurationFile> for MatchingConfiguration {
    fn from(file: ConfigurationFile) -> Self {
        let mut config = MatchingConfiguration::new();
        config.set_include_headers(file.include_headers);
        config.set_exclude_query_params(file.exclude_query_params);
        config.set_exclude_body(file.exclude_body);
        config.set_record_failed_responses(file.record_failed_responses);
        config.set_record_response_headers(file.record_response_headers);
        config.set_miss_policy(file.miss_policy);
        config
    }
}

/// Process-level settings for the shared interception point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    fixtures_dir: PathBuf,
}

impl Settings {
    pub fn new<P: Into<PathBuf>>(fixtures_dir: P) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
        }
    }

    pub fn from_env() -> Self {
        let fixtures_dir = env::var_os(FIXTURES_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURES_DIR));

        Self { fixtures_dir }
    }

    pub fn fixtures_dir(&self) -> &PathBuf {
        &self.fixtures_dir
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
