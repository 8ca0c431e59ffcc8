// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use actix_web::{HttpRequest, http::header::HeaderMap, web::Bytes};
use common::http::{RequestHead, RequestPayload};

pub struct ActixRequestHead {
    // we cannot refer to HttpRequest directly, as it holds an Rc (and therefore does
    // not impl Send or Sync)
    headers: HeaderMap,
    method: http::Method,
    uri: String,
    path: String,
    peer_addr: Option<String>,
    protocol: String,
    secure: bool,
    local_port: u16,
}

impl ActixRequestHead {
    /// Returns `None` for a method that cannot be expressed as an `http` 1.x method
    pub fn from_request(req: &HttpRequest) -> Option<ActixRequestHead> {
        // Actix uses http-0.2. However, the rest of the system uses
        // http-1.x, so we need to convert between the two.
        let method = http::Method::from_bytes(req.method().as_str().as_bytes()).ok()?;

        let uri = req
            .uri()
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());

        Some(ActixRequestHead {
            headers: req.headers().clone(),
            method,
            uri,
            path: req.path().to_string(),
            peer_addr: req.peer_addr().map(|addr| addr.to_string()),
            protocol: format!("{:?}", req.version()),
            secure: req.connection_info().scheme() == "https",
            local_port: req.app_config().local_addr().port(),
        })
    }
}

impl RequestHead for ActixRequestHead {
    fn get_headers(&self, key: &str) -> Vec<String> {
        self.headers
            .get_all(key.to_lowercase())
            .filter_map(|h| h.to_str().ok())
            .map(|h| h.to_string())
            .collect()
    }

    fn get_header_names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for name in self.headers.keys() {
            let name = name.as_str().to_string();
            if !names.contains(&name) {
                names.push(name);
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
        self.path.clone()
    }

    fn get_peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }

    fn get_protocol(&self) -> String {
        self.protocol.clone()
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn get_local_port(&self) -> Option<u16> {
        Some(self.local_port)
    }
}

pub struct ActixRequestPayload {
    pub head: ActixRequestHead,
    pub body: Bytes,
}

impl RequestPayload for ActixRequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync) {
        &self.head
    }

    fn get_body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn head_from_actix_request() {
        let req = TestRequest::post()
            .uri("/graphql?debug=1")
            .insert_header(("Host", "example.localhost:8080"))
            .append_header(("Cookie", "a=1"))
            .append_header(("Cookie", "b=2"))
            .peer_addr("10.0.0.7:4242".parse().unwrap())
            .to_http_request();

        let head = ActixRequestHead::from_request(&req).unwrap();

        assert_eq!(head.get_method(), http::Method::POST);
        assert_eq!(head.get_uri(), "/graphql?debug=1");
        assert_eq!(head.get_path(), "/graphql");
        assert_eq!(head.get_host().as_deref(), Some("example.localhost:8080"));
        assert_eq!(head.get_headers("cookie"), vec!["a=1", "b=2"]);
        assert_eq!(head.get_peer_addr().as_deref(), Some("10.0.0.7:4242"));
        assert_eq!(head.get_protocol(), "HTTP/1.1");
        assert!(!head.is_secure());

        let mut names = head.get_header_names();
        names.sort();
        assert_eq!(names, vec!["cookie", "host"]);
    }
}
