// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(any(feature = "test-support", test))]

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tempfile::TempDir;

use crate::http::{RequestHead, RequestPayload};

/// A document root materialized in a temporary directory.
///
/// Resolver scripts are written with mode `0755`, declaration files with the default mode.
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable shell script at `relative` (parent directories are created)
    pub fn script(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.file(relative, &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A resolver script that answers the discovery call with `fields` and otherwise runs `body`
    pub fn resolver(&self, relative: &str, fields: &[&str], body: &str) -> PathBuf {
        let discovery = serde_json::to_string(fields).unwrap();
        self.script(
            relative,
            &format!(
                "if [ \"$1\" = \"--graphqld-fields\" ]; then\n  echo '{discovery}'\n  exit 0\nfi\n{body}"
            ),
        )
    }

    pub fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.dir.path().join(relative)).unwrap();
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct TestRequestHead {
    pub method: http::Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub peer_addr: Option<String>,
    pub secure: bool,
    pub local_port: Option<u16>,
}

impl Default for TestRequestHead {
    fn default() -> Self {
        Self {
            method: http::Method::POST,
            uri: "/".to_string(),
            headers: vec![("host".to_string(), "localhost:8080".to_string())],
            peer_addr: Some("127.0.0.1:54321".to_string()),
            secure: false,
            local_port: Some(8080),
        }
    }
}

impl TestRequestHead {
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }
}

impl RequestHead for TestRequestHead {
    fn get_headers(&self, key: &str) -> Vec<String> {
        let key = key.to_lowercase();
        self.headers
            .iter()
            .filter(|(k, _)| k == &key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn get_header_names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for (name, _) in &self.headers {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn get_method(&self) -> http::Method {
        self.method.clone()
    }

    fn get_uri(&self) -> String {
        self.uri.clone()
    }

    fn get_path(&self) -> String {
        self.uri.split('?').next().unwrap_or_default().to_string()
    }

    fn get_peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }

    fn get_protocol(&self) -> String {
        "HTTP/1.1".to_string()
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn get_local_port(&self) -> Option<u16> {
        self.local_port
    }
}

pub struct TestRequestPayload {
    pub head: TestRequestHead,
    pub body: Bytes,
}

impl TestRequestPayload {
    pub fn graphql(query: &str) -> Self {
        Self::json(serde_json::json!({ "query": query }))
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self {
            head: TestRequestHead::default().with_header("content-type", "application/json"),
            body: Bytes::from(body.to_string()),
        }
    }
}

impl RequestPayload for TestRequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync) {
        &self.head
    }

    fn get_body(&self) -> &Bytes {
        &self.body
    }
}
