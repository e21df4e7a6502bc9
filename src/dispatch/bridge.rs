//! Header bridge.
//!
//! The ingress gateway cannot set arbitrary headers, so it forwards the HTTP
//! query string in a single header. This module expands it back into one
//! prefixed header per parameter.
//!
//! ```text
//! X-NatsBridge-UrlQuery: a=1&a=2&b=3
//!     → X-Sencillo-a: [1, 2]
//!     → X-Sencillo-b: [3]
//! ```

use std::collections::HashMap;

use percent_encoding::percent_decode;
use thiserror::Error;

use crate::transport::Headers;

/// Header the gateway puts the raw query string in.
pub const BRIDGE_QUERY_HEADER: &str = "X-NatsBridge-UrlQuery";

/// Prefix of every bridged parameter header.
pub const BRIDGED_PREFIX: &str = "X-Sencillo-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid semicolon separator in query")]
    Semicolon,

    #[error("query component {0:?} does not decode to UTF-8")]
    InvalidUtf8(String),
}

/// Header name a bridged parameter is stored under.
pub fn bridged_key(name: &str) -> String {
    format!("{BRIDGED_PREFIX}{name}")
}

/// Expand the bridged query string into prefixed headers.
///
/// Nothing is written unless the whole query parses. A missing or empty
/// bridge header is a no-op.
pub fn build_query_headers(headers: &mut Headers) -> Result<(), BridgeError> {
    let query = headers.get(BRIDGE_QUERY_HEADER).unwrap_or_default();
    let params = parse_query(query)?;

    for (name, values) in params {
        headers.insert_all(bridged_key(&name), values);
    }

    Ok(())
}

/// Values of a bridged parameter, looked up by its original name.
pub fn query_values<'a>(headers: &'a Headers, name: &str) -> &'a [String] {
    headers.values(&bridged_key(name))
}

/// Strict `application/x-www-form-urlencoded` parse.
///
/// Parameters come back in order of first appearance, each with its values
/// in order. A component whose escapes decode to invalid UTF-8 fails the
/// whole parse rather than being replaced lossily.
pub fn parse_query(query: &str) -> Result<Vec<(String, Vec<String>)>, BridgeError> {
    if query.contains(';') {
        return Err(BridgeError::Semicolon);
    }
    validate_escapes(query)?;

    let mut order: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?;

        match index.get(&key) {
            Some(&i) => {
                if let Some((_, values)) = order.get_mut(i) {
                    values.push(value);
                }
            }
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![value]));
            }
        }
    }

    Ok(order)
}

// '+' is a space; escapes must decode to UTF-8.
fn decode_component(raw: &str) -> Result<String, BridgeError> {
    let plus_as_space = raw.replace('+', " ");
    percent_decode(plus_as_space.as_bytes())
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| BridgeError::InvalidUtf8(raw.to_string()))
}

// Every '%' must start a two-digit hex escape.
fn validate_escapes(s: &str) -> Result<(), BridgeError> {
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = |j: usize| bytes.get(j).is_some_and(|b| b.is_ascii_hexdigit());
            if !(hex(i + 1) && hex(i + 2)) {
                let end = (i + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[i..end]).into_owned();
                return Err(BridgeError::InvalidEscape(escape));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    Ok(())
}
