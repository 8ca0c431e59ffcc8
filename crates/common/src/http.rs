// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::Bytes;
use http::StatusCode;

pub trait RequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync);
    fn get_body(&self) -> &Bytes;
}

/// Response headers, in insertion order. Names are stored lower-cased; a name may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn from_vec(vec: Vec<(String, String)>) -> Self {
        let mut headers = vec![];
        for (key, value) in vec {
            headers.push((key.to_lowercase(), value));
        }
        Self { inner: headers }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner
            .iter()
            .find(|(k, _)| k == &key.to_lowercase())
            .map(|(_, v)| v.clone())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        let key = key.to_lowercase();
        self.inner
            .iter()
            .filter(|(k, _)| k == &key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.remove(&key);
        self.append(key, value);
    }

    /// Add a value without touching existing values of the same name
    pub fn append(&mut self, key: String, value: String) {
        self.inner.push((key.to_lowercase(), value));
    }

    pub fn extend(&mut self, other: Headers) {
        self.inner.extend(other.inner);
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.retain(|(k, _)| k != &key.to_lowercase());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

pub struct ResponsePayload {
    pub body: ResponseBody,
    pub headers: Headers,
    pub status_code: StatusCode,
}

impl ResponsePayload {
    pub fn status(status_code: StatusCode) -> Self {
        Self {
            body: ResponseBody::None,
            headers: Headers::new(),
            status_code,
        }
    }
}

pub enum ResponseBody {
    Bytes(Vec<u8>),
    Html(String),
    None,
}

/// Represents a HTTP request from which information can be extracted
pub trait RequestHead {
    /// All values of the header `key`, in the order they were received
    fn get_headers(&self, key: &str) -> Vec<String>;

    // return the first header
    fn get_header(&self, key: &str) -> Option<String> {
        self.get_headers(&key.to_lowercase()).first().cloned()
    }

    /// Names of all headers present in the request (each listed once)
    fn get_header_names(&self) -> Vec<String>;

    fn get_method(&self) -> http::Method;

    /// The request target as received (path and query)
    fn get_uri(&self) -> String;

    fn get_path(&self) -> String;

    // the `Host` header, as sent by the client (may include a port)
    fn get_host(&self) -> Option<String> {
        self.get_header("host")
    }

    /// The peer address as `ip:port` (or whatever form the transport reports)
    fn get_peer_addr(&self) -> Option<String>;

    /// e.g. `HTTP/1.1`
    fn get_protocol(&self) -> String;

    fn is_secure(&self) -> bool;

    fn get_local_port(&self) -> Option<u16>;

    fn get_content_length(&self) -> Option<u64> {
        self.get_header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }
}

/// Strip the port from a `Host` header value, handling bracketed IPv6 literals
pub fn host_without_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
