use crate::{
    data::{RequestDescriptor, ResponseDescriptor},
    error::{Error, Result},
    live,
};
use async_trait::async_trait;
use hyper_tls::HttpsConnector;
use std::fmt::Debug;

/// Performs the real network call. Failures are handed back to the caller untouched.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor>;
}

#[derive(Debug)]
pub struct HyperTransport {}

impl HyperTransport {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        let request = live::into_request(request)?;

        // a fresh client per call keeps it tied to the caller's runtime
        let client = hyper::Client::builder().build::<_, hyper::Body>(HttpsConnector::new());

        let response = client
            .request(request)
            .await
            .map_err(|e| Error::Transport(Box::new(e)))?;

        live::read_response(response).await
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}
