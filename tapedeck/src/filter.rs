//! Projects descriptors onto the fields a [`MatchingConfiguration`] considers.
//!
//! Anything not considered is dropped outright, so it can never reach a fixture
//! file or a diagnostics report.

use crate::{
    configuration::{MatchingConfiguration, ResponseHeaderPolicy},
    data::{Headers, RequestDescriptor, ResponseDescriptor},
};
use std::collections::BTreeMap;
use url::Url;

pub type QueryParams = BTreeMap<String, Vec<String>>;

pub fn filter_request(config: &MatchingConfiguration, request: &RequestDescriptor) -> RequestDescriptor {
    RequestDescriptor {
        method: request.method.clone(),
        url: strip_excluded_query_params(config, &request.url),
        headers: filter_request_headers(config, &request.headers),
        body: if config.considers_body() {
            request.body.clone()
        } else {
            None
        },
    }
}

pub fn filter_response(
    config: &MatchingConfiguration,
    response: &ResponseDescriptor,
) -> ResponseDescriptor {
    let headers = match config.record_response_headers() {
        ResponseHeaderPolicy::None => Headers::new(),
        ResponseHeaderPolicy::All => lower_case_headers(&response.headers),
        ResponseHeaderPolicy::Only(names) => lower_case_headers(&response.headers)
            .into_iter()
            .filter(|(name, _)| names.contains(name))
            .collect(),
    };

    ResponseDescriptor {
        status: response.status,
        headers,
        body: response.body.clone(),
    }
}

pub fn filter_request_headers(config: &MatchingConfiguration, headers: &Headers) -> Headers {
    if !config.considers_headers() {
        return Headers::new();
    }

    lower_case_headers(headers)
        .into_iter()
        .filter(|(name, _)| config.include_headers().contains(name))
        .collect()
}

/// Removes excluded parameters from the URL itself. Unparsable URLs are kept verbatim.
pub fn strip_excluded_query_params(config: &MatchingConfiguration, raw_url: &str) -> String {
    let mut url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(_) => return String::from(raw_url),
    };

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if !pairs
        .iter()
        .any(|(name, _)| config.is_query_param_excluded(name))
    {
        return String::from(raw_url);
    }

    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(name, _)| !config.is_query_param_excluded(name))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(name, value)| (name, value)));
    }

    url.into()
}

pub fn query_params(url: &Url) -> QueryParams {
    let mut params = QueryParams::new();

    for (name, value) in url.query_pairs() {
        params
            .entry(name.into_owned())
            .or_insert_with(Vec::new)
            .push(value.into_owned());
    }

    params
}

/// Query parameters of `raw_url` with the excluded ones removed.
pub fn considered_query_params(config: &MatchingConfiguration, raw_url: &str) -> QueryParams {
    match Url::parse(raw_url) {
        Ok(url) => query_params(&url)
            .into_iter()
            .filter(|(name, _)| !config.is_query_param_excluded(name))
            .collect(),
        Err(_) => QueryParams::new(),
    }
}

fn lower_case_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.clone()))
        .collect()
}
