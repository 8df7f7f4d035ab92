use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: &str = "1";

pub type Headers = BTreeMap<String, String>;

/// A request as seen by the matcher: method, absolute URL including the query,
/// lower-cased header names and an optional textual body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<String>,
}

impl RequestDescriptor {
    pub fn new<M: Into<String>, U: Into<String>>(method: M, url: U) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl ResponseDescriptor {
    pub fn new<B: Into<String>>(status: u16, body: B) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedExchange {
    pub request: RequestDescriptor,
    pub response: ResponseDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMeta {
    pub captured_at: String,
    pub session_name: String,
    pub schema_version: String,
}

impl CaptureMeta {
    pub fn now<S: Into<String>>(session_name: S) -> Self {
        Self {
            captured_at: chrono::Utc::now().to_rfc3339(),
            session_name: session_name.into(),
            schema_version: String::from(SCHEMA_VERSION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFile {
    pub meta: CaptureMeta,
    #[serde(default)]
    pub exchanges: Vec<CapturedExchange>,
}
