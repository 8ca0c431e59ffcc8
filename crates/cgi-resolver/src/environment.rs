// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::http::{RequestHead, host_without_port};
use treeql_env::Environment;

const DEFAULT_PATH: &str = "/bin:/usr/bin:/usr/ucb:/usr/bsd:/usr/local/bin";

/// The CGI variables describing one inbound request. Built once per request and shared by every
/// resolver the request invokes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiEnvironment {
    vars: Vec<(String, String)>,
}

impl CgiEnvironment {
    pub fn from_request(head: &(dyn RequestHead + Send + Sync), env: &dyn Environment) -> Self {
        let host = head.get_host().unwrap_or_default();

        let mut vars = vec![
            (
                "SERVER_SOFTWARE".to_string(),
                concat!("treeql/", env!("CARGO_PKG_VERSION")).to_string(),
            ),
            ("SERVER_NAME".to_string(), host_without_port(&host).to_string()),
            ("SERVER_PROTOCOL".to_string(), head.get_protocol()),
            ("HTTP_HOST".to_string(), host.clone()),
            ("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string()),
            ("REQUEST_METHOD".to_string(), head.get_method().to_string()),
            ("REQUEST_URI".to_string(), head.get_uri()),
        ];

        if let Some(port) = head.get_local_port() {
            vars.push(("SERVER_PORT".to_string(), port.to_string()));
        }

        if let Some(peer) = head.get_peer_addr() {
            match split_host_port(&peer) {
                Some((ip, port)) => {
                    vars.push(("REMOTE_ADDR".to_string(), ip.to_string()));
                    vars.push(("REMOTE_HOST".to_string(), ip.to_string()));
                    vars.push(("REMOTE_PORT".to_string(), port.to_string()));
                }
                None => {
                    vars.push(("REMOTE_ADDR".to_string(), peer.clone()));
                    vars.push(("REMOTE_HOST".to_string(), peer));
                }
            }
        }

        if head.is_secure() {
            vars.push(("HTTPS".to_string(), "on".to_string()));
        }

        let mut header_names = head.get_header_names();
        header_names.sort();
        header_names.dedup();

        for header_name in header_names {
            let name = variable_name(&header_name);
            // An inbound `Proxy` header would become HTTP_PROXY, which many programs treat as
            // their outbound proxy
            if name == "PROXY" {
                continue;
            }
            let separator = if name == "COOKIE" { "; " } else { ", " };
            let value = head.get_headers(&header_name).join(separator);
            vars.push((format!("HTTP_{name}"), value));
        }

        if let Some(length) = head.get_content_length().filter(|length| *length > 0) {
            vars.push(("CONTENT_LENGTH".to_string(), length.to_string()));
        }
        if let Some(content_type) = head
            .get_header("content-type")
            .filter(|content_type| !content_type.is_empty())
        {
            vars.push(("CONTENT_TYPE".to_string(), content_type));
        }

        let path = env
            .get("PATH")
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());
        vars.push(("PATH".to_string(), path));

        Self { vars }
    }

    /// The variables for one resolver invocation, with a later definition of a name replacing
    /// an earlier one
    pub fn for_script(&self, script_name: &str, script_filename: &str) -> Vec<(String, String)> {
        let mut vars = self.vars.clone();
        vars.push(("SCRIPT_NAME".to_string(), script_name.to_string()));
        vars.push(("SCRIPT_FILENAME".to_string(), script_filename.to_string()));
        remove_leading_duplicates(vars)
    }

    pub fn vars(&self) -> Vec<(String, String)> {
        remove_leading_duplicates(self.vars.clone())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn variable_name(header_name: &str) -> String {
    header_name
        .chars()
        .map(|c| match c {
            '-' | '=' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        (host, rest.strip_prefix(':')?)
    } else {
        let (host, port) = addr.rsplit_once(':')?;
        if host.contains(':') {
            // A bare IPv6 address without a port
            return None;
        }
        (host, port)
    };

    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((host, port))
}

fn remove_leading_duplicates(vars: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = Vec::with_capacity(vars.len());
    for (index, (name, value)) in vars.iter().enumerate() {
        if !vars[index + 1..].iter().any(|(later, _)| later == name) {
            kept.push((name.clone(), value.clone()));
        }
    }
    kept
}
