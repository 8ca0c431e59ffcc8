// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod request;

use actix_web::{
    HttpRequest, HttpResponse,
    web::{self, Bytes, ServiceConfig},
};
use graphql_router::GraphQLRouter;

use common::{
    http::{ResponseBody, ResponsePayload},
    router::Router,
};
use request::{ActixRequestHead, ActixRequestPayload};

macro_rules! error_msg {
    ($msg:literal) => {
        concat!("{\"errors\": [{\"message\":\"", $msg, "\"}]}").as_bytes()
    };
}

/// Mount the router as the default service. Bodies larger than `max_body_size` are rejected by
/// actix before they reach the router; each graph then applies its own limit.
pub fn configure_router(
    router: web::Data<GraphQLRouter>,
    max_body_size: usize,
) -> impl FnOnce(&mut ServiceConfig) {
    move |app| {
        app.app_data(router)
            .app_data(web::PayloadConfig::new(max_body_size))
            .default_service(web::to(resolve));
    }
}

async fn resolve(
    http_request: HttpRequest,
    body: Bytes,
    router: web::Data<GraphQLRouter>,
) -> HttpResponse {
    let Some(head) = ActixRequestHead::from_request(&http_request) else {
        return HttpResponse::build(actix_web::http::StatusCode::METHOD_NOT_ALLOWED)
            .body(error_msg!("Unsupported method"));
    };
    let request = ActixRequestPayload { head, body };

    match router.route(&request).await {
        Some(response) => to_http_response(response),
        None => HttpResponse::build(actix_web::http::StatusCode::NOT_FOUND)
            .body(error_msg!("Not found")),
    }
}

fn to_http_response(response: ResponsePayload) -> HttpResponse {
    let ResponsePayload {
        body,
        headers,
        status_code,
    } = response;

    let actix_status_code = match to_actix_status_code(status_code) {
        Ok(status_code) => status_code,
        Err(err) => {
            tracing::error!("Invalid status code: {}", err);
            return HttpResponse::build(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(error_msg!("Invalid status code"));
        }
    };

    let mut builder = HttpResponse::build(actix_status_code);

    for header in headers.into_iter() {
        builder.append_header(header);
    }

    match body {
        ResponseBody::Bytes(bytes) => builder.body(bytes),
        ResponseBody::Html(html) => builder.body(html),
        ResponseBody::None => builder.body(""),
    }
}

// Actix uses http-0.2. However, the rest of the system uses
// http-1.x, so we need to convert between the two.
fn to_actix_status_code(
    status_code: http::StatusCode,
) -> Result<actix_web::http::StatusCode, String> {
    actix_web::http::StatusCode::from_u16(status_code.as_u16())
        .map_err(|_| "Invalid status code".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use common::{
        config::{GraphConfig, ServerConfig},
        test_support::TestTree,
    };
    use graphql_router::GraphHost;
    use treeql_env::MapEnvironment;

    use super::*;

    async fn router(tree: &TestTree) -> web::Data<GraphQLRouter> {
        let graph = GraphConfig {
            max_body_size: 256,
            ..GraphConfig::new(tree.root().to_path_buf())
        };
        let env = Arc::new(MapEnvironment::from([("PATH", "/usr/bin:/bin")]));
        let host = GraphHost::start(graph.clone(), env).await.unwrap();

        web::Data::new(GraphQLRouter::new(
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                graphql_http_path: "/".to_string(),
                graphiql_http_path: "/graphiql".to_string(),
                graphs: vec![graph],
            },
            vec![host],
        ))
    }

    #[actix_web::test]
    async fn serves_queries_over_http() {
        let tree = TestTree::new();
        tree.resolver(
            "greet",
            &["greet: String"],
            "printf 'X-Resolver: greet\\n\\nhello'",
        );
        let app =
            test::init_service(App::new().configure(configure_router(router(&tree).await, 1024)))
                .await;

        let req = test::TestRequest::post()
            .uri("/")
            .insert_header(("content-type", "application/json"))
            .set_payload(r#"{"query": "{ greet }"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        assert_eq!(
            resp.headers().get("x-resolver").and_then(|v| v.to_str().ok()),
            Some("greet")
        );
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"data": {"greet": "hello"}}));
    }

    #[actix_web::test]
    async fn unknown_paths_and_oversized_bodies() {
        let tree = TestTree::new();
        tree.resolver("greet", &["greet: String"], "printf hello");
        let app =
            test::init_service(App::new().configure(configure_router(router(&tree).await, 1024)))
                .await;

        let req = test::TestRequest::get().uri("/nowhere").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(format!(r#"{{"query": "{{ greet }} # {}"}}"#, "x".repeat(300)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
