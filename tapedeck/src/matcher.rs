//! Request equivalence.
//!
//! Two descriptors match when every rule in [`RULES`] accepts them. Rules run in
//! order and stop at the first rejection; method and endpoint are always checked,
//! the rest depend on the active [`MatchingConfiguration`].

use crate::{
    configuration::MatchingConfiguration,
    data::{Headers, RequestDescriptor},
    filter,
};
use serde_json::Value;
use url::Url;

pub type Rule = fn(&RequestDescriptor, &RequestDescriptor, &MatchingConfiguration) -> bool;

pub const RULES: &[(&str, Rule)] = &[
    ("method", method_matches),
    ("endpoint", endpoint_matches),
    ("query", query_matches),
    ("headers", headers_match),
    ("body", body_matches),
];

pub fn matches(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    config: &MatchingConfiguration,
) -> bool {
    first_mismatch(stored, live, config).is_none()
}

/// Name of the first rule that rejects the pair, if any.
pub fn first_mismatch(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    config: &MatchingConfiguration,
) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(_, rule)| !rule(stored, live, config))
        .map(|(name, _)| *name)
}

pub fn method_matches(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    _: &MatchingConfiguration,
) -> bool {
    stored.method == live.method
}

/// Scheme, host, port and path must be identical.
pub fn endpoint_matches(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    _: &MatchingConfiguration,
) -> bool {
    match (Url::parse(&stored.url), Url::parse(&live.url)) {
        (Ok(stored_url), Ok(live_url)) => {
            stored_url.scheme() == live_url.scheme()
                && stored_url.host_str() == live_url.host_str()
                && stored_url.port_or_known_default() == live_url.port_or_known_default()
                && stored_url.path() == live_url.path()
        }
        _ => without_query(&stored.url) == without_query(&live.url),
    }
}

pub fn query_matches(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    config: &MatchingConfiguration,
) -> bool {
    match (Url::parse(&stored.url), Url::parse(&live.url)) {
        (Ok(_), Ok(_)) => {
            filter::considered_query_params(config, &stored.url)
                == filter::considered_query_params(config, &live.url)
        }
        _ => query_part(&stored.url) == query_part(&live.url),
    }
}

pub fn headers_match(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    config: &MatchingConfiguration,
) -> bool {
    config.include_headers().iter().all(|name| {
        header_value(&stored.headers, name) == header_value(&live.headers, name)
    })
}

pub fn body_matches(
    stored: &RequestDescriptor,
    live: &RequestDescriptor,
    config: &MatchingConfiguration,
) -> bool {
    if !config.considers_body() {
        return true;
    }

    match (&stored.body, &live.body) {
        (None, None) => true,
        (Some(stored_body), Some(live_body)) => bodies_equivalent(stored_body, live_body),
        _ => false,
    }
}

/// Structured bodies compare by value so key order doesn't matter; anything
/// that doesn't parse compares as text.
pub fn bodies_equivalent(lhs: &str, rhs: &str) -> bool {
    match (
        serde_json::from_str::<Value>(lhs),
        serde_json::from_str::<Value>(rhs),
    ) {
        (Ok(lhs), Ok(rhs)) => values_equivalent(&lhs, &rhs),
        _ => lhs == rhs,
    }
}

// `1` and `1.0` are the same number
fn values_equivalent(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => lhs == rhs,
        },
        (Value::Array(lhs), Value::Array(rhs)) => {
            lhs.len() == rhs.len()
                && lhs.iter().zip(rhs).all(|(lhs, rhs)| values_equivalent(lhs, rhs))
        }
        (Value::Object(lhs), Value::Object(rhs)) => {
            lhs.len() == rhs.len()
                && lhs.iter().all(|(key, lhs)| {
                    rhs.get(key)
                        .map(|rhs| values_equivalent(lhs, rhs))
                        .unwrap_or(false)
                })
        }
        _ => lhs == rhs,
    }
}

fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn without_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn query_part(url: &str) -> Option<&str> {
    url.splitn(2, '?').nth(1)
}
