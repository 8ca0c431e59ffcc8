// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_graphql::{BatchRequest, Executor, http::GraphiQLSource};
use async_trait::async_trait;
use base64::Engine;
use cgi_resolver::CgiEnvironment;
use common::{
    config::{BasicAuth, ServerConfig},
    http::{Headers, RequestHead, RequestPayload, ResponseBody, ResponsePayload},
    router::Router,
};
use http::{Method, StatusCode};
use tracing::{debug, error, instrument, warn};

use crate::{graph_host::GraphHost, request_data::RequestData};

/// Serves the GraphQL endpoint (and, where enabled, GraphiQL) of every configured graph
pub struct GraphQLRouter {
    config: ServerConfig,
    /// In the same order as `config.graphs`
    graphs: Vec<Arc<GraphHost>>,
}

impl GraphQLRouter {
    pub fn new(config: ServerConfig, graphs: Vec<Arc<GraphHost>>) -> Self {
        Self { config, graphs }
    }

    pub fn graphs(&self) -> &[Arc<GraphHost>] {
        &self.graphs
    }

    fn select_graph(&self, request_head: &(dyn RequestHead + Send + Sync)) -> Option<&GraphHost> {
        self.config
            .graph_index_for_host(request_head.get_host().as_deref())
            .and_then(|index| self.graphs.get(index))
            .map(Arc::as_ref)
    }

    async fn resolve(
        &self,
        graph: &GraphHost,
        request: &(dyn RequestPayload + Send + Sync),
    ) -> ResponsePayload {
        let request_head = request.get_head();
        let body = request.get_body();

        if body.len() > graph.config().max_body_size {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large");
        }

        let batch = match request_head.get_method() {
            Method::GET => {
                let query = request_head
                    .get_uri()
                    .split_once('?')
                    .map(|(_, query)| query.to_string())
                    .unwrap_or_default();
                async_graphql::http::parse_query_string(&query)
                    .map(BatchRequest::Single)
                    .map_err(|e| e.to_string())
            }
            Method::POST => serde_json::from_slice::<BatchRequest>(body).map_err(|e| e.to_string()),
            _ => {
                return error_response(StatusCode::METHOD_NOT_ALLOWED, "Use GET or POST");
            }
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                debug!("Invalid GraphQL request: {e}");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid GraphQL request: {e}"),
                );
            }
        };

        let Some(schema) = graph.current().await else {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "The schema is not available yet",
            );
        };

        let environment = CgiEnvironment::from_request(request_head, graph.env());
        let context = match graph.context_generator() {
            Some(generator) => match generator.generate(&environment).await {
                Ok(context) => Some(context),
                Err(e) => {
                    error!(graph = %graph.config().label(), "{e}");
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Could not create the request context",
                    );
                }
            },
            None => None,
        };

        let data = Arc::new(RequestData::new(environment, context));
        let response = schema.executable.execute_batch(batch.data(data.clone())).await;

        let body = match serde_json::to_vec(&response) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize the response: {e}");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to serialize the response",
                );
            }
        };

        let mut headers = data.take_response_headers();
        headers.insert("content-type".into(), "application/json".into());

        ResponsePayload {
            body: ResponseBody::Bytes(body),
            headers,
            status_code: StatusCode::OK,
        }
    }

    fn graphiql(&self, graph: &GraphHost, method: Method) -> ResponsePayload {
        if !graph.config().graphiql {
            return error_response(StatusCode::NOT_FOUND, "GraphiQL is not enabled");
        }
        if method != Method::GET {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, "Use GET");
        }

        let html = GraphiQLSource::build()
            .endpoint(&self.config.graphql_http_path)
            .title("treeql")
            .finish();

        let mut headers = Headers::new();
        headers.insert("content-type".into(), "text/html; charset=utf-8".into());

        ResponsePayload {
            body: ResponseBody::Html(html),
            headers,
            status_code: StatusCode::OK,
        }
    }
}

#[async_trait]
impl Router for GraphQLRouter {
    #[instrument(
        name = "GraphQLRouter::route",
        skip(self, request),
        fields(path = %request.get_head().get_path())
    )]
    async fn route(&self, request: &(dyn RequestPayload + Send + Sync)) -> Option<ResponsePayload> {
        let request_head = request.get_head();
        let path = request_head.get_path();

        let is_graphql = path == self.config.graphql_http_path;
        let is_graphiql = path == self.config.graphiql_http_path;
        if !is_graphql && !is_graphiql {
            return None;
        }

        let Some(graph) = self.select_graph(request_head) else {
            debug!(host = ?request_head.get_host(), "No graph for host");
            return Some(error_response(
                StatusCode::NOT_FOUND,
                "No graph is served for this host",
            ));
        };

        if let Some(basic_auth) = &graph.config().basic_auth {
            if !is_authorized(request_head, basic_auth) {
                warn!(graph = %graph.config().label(), "Rejected request without valid credentials");
                let mut response =
                    error_response(StatusCode::UNAUTHORIZED, "Authentication required");
                response.headers.insert(
                    "www-authenticate".into(),
                    format!("Basic realm=\"{}\"", graph.config().label()),
                );
                return Some(response);
            }
        }

        if is_graphiql {
            return Some(self.graphiql(graph, request_head.get_method()));
        }

        Some(self.resolve(graph, request).await)
    }
}

fn is_authorized(request_head: &(dyn RequestHead + Send + Sync), basic_auth: &BasicAuth) -> bool {
    let Some(authorization) = request_head.get_header("authorization") else {
        return false;
    };
    let Some(encoded) = authorization
        .strip_prefix("Basic ")
        .or_else(|| authorization.strip_prefix("basic "))
    else {
        return false;
    };

    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((username, password)) => {
            username == basic_auth.username && password == basic_auth.password
        }
        None => false,
    }
}

fn error_response(status_code: StatusCode, message: &str) -> ResponsePayload {
    let body = serde_json::json!({ "errors": [{ "message": message }] }).to_string();

    let mut headers = Headers::new();
    headers.insert("content-type".into(), "application/json".into());

    ResponsePayload {
        body: ResponseBody::Bytes(body.into_bytes()),
        headers,
        status_code,
    }
}

#[cfg(test)]
mod tests {
    use common::{
        config::GraphConfig,
        test_support::{TestRequestHead, TestRequestPayload, TestTree},
    };
    use treeql_env::MapEnvironment;

    use super::*;

    fn server_config(graphs: Vec<GraphConfig>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            graphql_http_path: "/".to_string(),
            graphiql_http_path: "/graphiql".to_string(),
            graphs,
        }
    }

    async fn router(graphs: Vec<GraphConfig>) -> GraphQLRouter {
        let env: Arc<dyn treeql_env::Environment> =
            Arc::new(MapEnvironment::from([("PATH", "/usr/bin:/bin")]));
        let mut hosts = vec![];
        for graph in &graphs {
            hosts.push(GraphHost::start(graph.clone(), env.clone()).await.unwrap());
        }
        GraphQLRouter::new(server_config(graphs), hosts)
    }

    fn json_body(response: &ResponsePayload) -> serde_json::Value {
        match &response.body {
            ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes).unwrap(),
            _ => panic!("expected a JSON body"),
        }
    }

    fn greeting_tree() -> TestTree {
        let tree = TestTree::new();
        tree.resolver(
            "greet",
            &["greet(name: String): String"],
            "printf 'X-Greeting: yes\\n\\nHello, %s' \"$2\"",
        );
        tree
    }

    #[test_log::test(tokio::test)]
    async fn post_and_get_requests() {
        let tree = greeting_tree();
        let router = router(vec![GraphConfig::new(tree.root().to_path_buf())]).await;

        let response = router
            .route(&TestRequestPayload::graphql("{ greet(name: \"Ada\") }"))
            .await
            .unwrap();
        assert_eq!(response.status_code, StatusCode::OK);
        assert_eq!(response.headers.get("x-greeting").as_deref(), Some("yes"));
        assert_eq!(
            response.headers.get("content-type").as_deref(),
            Some("application/json")
        );
        assert_eq!(
            json_body(&response),
            serde_json::json!({"data": {"greet": "Hello, Ada"}})
        );

        let get = TestRequestPayload {
            head: TestRequestHead {
                method: Method::GET,
                uri: "/?query=%7B%20greet%20%7D".to_string(),
                ..TestRequestHead::default()
            },
            body: Default::default(),
        };
        let response = router.route(&get).await.unwrap();
        assert_eq!(
            json_body(&response),
            serde_json::json!({"data": {"greet": "Hello, "}})
        );
    }

    #[test_log::test(tokio::test)]
    async fn unrelated_paths_are_not_routed() {
        let tree = greeting_tree();
        let router = router(vec![GraphConfig::new(tree.root().to_path_buf())]).await;

        let request = TestRequestPayload {
            head: TestRequestHead {
                uri: "/elsewhere".to_string(),
                ..TestRequestHead::default()
            },
            body: Default::default(),
        };
        assert!(router.route(&request).await.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn virtual_hosts() {
        let first = greeting_tree();
        let second = TestTree::new();
        second.resolver("wave", &["wave: String"], "printf bye");

        let router = router(vec![
            GraphConfig {
                server_name: Some("one.localhost".to_string()),
                ..GraphConfig::new(first.root().to_path_buf())
            },
            GraphConfig {
                server_name: Some("two.localhost".to_string()),
                ..GraphConfig::new(second.root().to_path_buf())
            },
        ])
        .await;

        let mut request = TestRequestPayload::graphql("{ wave }");
        request.head.headers = vec![("host".to_string(), "two.localhost:8080".to_string())];
        let response = router.route(&request).await.unwrap();
        assert_eq!(json_body(&response), serde_json::json!({"data": {"wave": "bye"}}));

        request.head.headers = vec![("host".to_string(), "three.localhost".to_string())];
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.status_code, StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn basic_auth_and_body_limit() {
        let tree = greeting_tree();
        let router = router(vec![GraphConfig {
            basic_auth: Some(BasicAuth {
                username: "u".to_string(),
                password: "p".to_string(),
            }),
            max_body_size: 64,
            ..GraphConfig::new(tree.root().to_path_buf())
        }])
        .await;

        let response = router
            .route(&TestRequestPayload::graphql("{ greet }"))
            .await
            .unwrap();
        assert_eq!(response.status_code, StatusCode::UNAUTHORIZED);
        assert!(response.headers.get("www-authenticate").is_some());

        let mut request = TestRequestPayload::graphql("{ greet }");
        // "u:p"
        request.head = request.head.with_header("Authorization", "Basic dTpw");
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.status_code, StatusCode::OK);

        let mut request = TestRequestPayload::graphql(&format!("{{ greet # {} }}", "x".repeat(100)));
        request.head = request.head.with_header("Authorization", "Basic dTpw");
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.status_code, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test_log::test(tokio::test)]
    async fn unavailable_until_a_schema_is_built() {
        let tree = TestTree::new();
        tree.file("broken.graphql", "type {");
        let router = router(vec![GraphConfig {
            hot_reload: true,
            ..GraphConfig::new(tree.root().to_path_buf())
        }])
        .await;

        let response = router
            .route(&TestRequestPayload::graphql("{ greet }"))
            .await
            .unwrap();
        assert_eq!(response.status_code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test_log::test(tokio::test)]
    async fn graphiql_page() {
        let tree = greeting_tree();
        let router = router(vec![GraphConfig {
            graphiql: true,
            ..GraphConfig::new(tree.root().to_path_buf())
        }])
        .await;

        let request = TestRequestPayload {
            head: TestRequestHead {
                method: Method::GET,
                uri: "/graphiql".to_string(),
                ..TestRequestHead::default()
            },
            body: Default::default(),
        };
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.status_code, StatusCode::OK);
        assert!(matches!(response.body, ResponseBody::Html(_)));
    }
}
