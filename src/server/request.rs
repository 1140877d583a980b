//! Raw request parsing for `RestService`.

use crate::error::RemoteError;
use may_minihttp::Request;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info};

/// Parsed HTTP request data used by `RestService`.
#[derive(Debug)]
pub struct ParsedRequest {
    pub method: http::Method,
    /// Request path with the query string stripped.
    pub path: String,
    /// HTTP headers (lowercase keys).
    pub headers: HashMap<String, String>,
    /// Parsed cookies from the Cookie header.
    pub cookies: HashMap<String, String>,
    /// Query fields; bracketed keys parsed into nested maps, leaves kept as
    /// strings for the coercion pass.
    pub query: Map<String, Value>,
    /// Parsed JSON body, when the payload parses as JSON.
    pub body: Option<Value>,
}

/// Extract cookies from the (already lowercased) header map.
#[must_use]
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse query string fields from a URL path.
///
/// Everything after `?` is URL-decoded; bracketed names like `a[foo][bar]=1`
/// build nested objects. Repeated keys keep the last value.
#[must_use]
pub fn parse_query(raw_path: &str) -> Map<String, Value> {
    let mut query = Map::new();
    let Some(pos) = raw_path.find('?') else {
        return query;
    };
    for (key, value) in url::form_urlencoded::parse(raw_path[pos + 1..].as_bytes()) {
        insert_bracketed(&mut query, &key, Value::String(value.to_string()));
    }
    query
}

/// Split `a[foo][bar]` into its key path and insert at the leaf. A name that
/// does not follow the bracket shape is used verbatim as a flat key.
fn insert_bracketed(query: &mut Map<String, Value>, name: &str, value: Value) {
    let Some(segments) = bracket_segments(name) else {
        query.insert(name.to_string(), value);
        return;
    };

    let mut current = query;
    let (last, inner) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    for segment in inner {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            // A scalar already claimed this key; the nested write wins.
            *entry = Value::Object(Map::new());
        }
        current = match entry.as_object_mut() {
            Some(map) => map,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

fn bracket_segments(name: &str) -> Option<Vec<&str>> {
    let open = name.find('[')?;
    if open == 0 || !name.ends_with(']') {
        return None;
    }
    let mut segments = vec![&name[..open]];
    let mut rest = &name[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let close = rest.find(']')?;
        let segment = &rest[1..close];
        if segment.is_empty() {
            return None;
        }
        segments.push(segment);
        rest = &rest[close + 1..];
    }
    Some(segments)
}

/// Parse an incoming HTTP request, enforcing the body-size limit before any
/// routing work happens. An oversized payload is rejected as 413 with the
/// standard error envelope.
pub fn parse_request(req: Request, body_limit: usize) -> Result<ParsedRequest, RemoteError> {
    let method = http::Method::from_bytes(req.method().as_bytes())
        .map_err(|_| RemoteError::validation(format!("unsupported method `{}`", req.method())))?;
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();
    debug!(
        header_count = headers.len(),
        header_names = ?headers.keys().take(20).collect::<Vec<_>>(),
        "Headers extracted"
    );

    let cookies = parse_cookies(&headers);
    debug!(
        cookie_count = cookies.len(),
        cookie_names = ?cookies.keys().collect::<Vec<_>>(),
        "Cookies extracted"
    );

    let query = parse_query(&raw_path);
    debug!(field_count = query.len(), query = ?query, "Query fields parsed");

    let mut body_bytes = Vec::new();
    if req.body().read_to_end(&mut body_bytes).is_err() {
        body_bytes.clear();
    }
    if body_bytes.len() > body_limit {
        return Err(RemoteError::validation(format!(
            "request body of {} bytes exceeds the {} byte limit",
            body_bytes.len(),
            body_limit
        ))
        .with_name("PayloadTooLargeError")
        .with_status(413));
    }
    let body = if body_bytes.is_empty() {
        None
    } else {
        let parsed: Option<Value> = serde_json::from_slice(&body_bytes).ok();
        debug!(
            body_size_bytes = body_bytes.len(),
            parsed_as_json = parsed.is_some(),
            "Request body read"
        );
        parsed
    };

    info!(
        method = %method,
        path = %path,
        headers_count = headers.len(),
        "HTTP request parsed"
    );

    Ok(ParsedRequest {
        method,
        path,
        headers,
        cookies,
        query,
        body,
    })
}
