// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use actix_web::{App, HttpServer, middleware, web};

use graphql_router::{GraphHost, GraphHostError, GraphQLRouter};
use server_actix::configure_router;
use thiserror::Error;
use tracing_actix_web::TracingLogger;

use std::net::SocketAddr;
use std::time;
use std::{io::ErrorKind, sync::Arc};

use common::{
    config::{ConfigError, ServerConfig, load_config},
    logging_tracing,
};

use treeql_env::{EnvError, Environment, SystemEnvironment};

#[derive(Error)]
enum ServerError {
    #[error("Port {0} is already in use. Check if there is another process running at that port.")]
    PortInUse(u16),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Env(#[from] EnvError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    GraphHost(#[from] GraphHostError),
}

// A custom `Debug` implementation for `ServerError` (that delegate to the `Display` impl), so that
// we don't print the default `Debug` implementation's message when the server exits.
impl std::fmt::Debug for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Serve the configured directory trees over HTTP
#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    let start_time = time::SystemTime::now();

    let env: Arc<dyn Environment> = Arc::new(SystemEnvironment);

    logging_tracing::init(env.as_ref())?;

    let config = load_config(env.as_ref())?;

    let mut graphs = Vec::with_capacity(config.graphs.len());
    // Watching stops when these are dropped, so they must live as long as the server
    let mut watchers = vec![];
    for graph in &config.graphs {
        let host = GraphHost::start(graph.clone(), env.clone()).await?;
        if graph.hot_reload {
            watchers.push(host.watch()?);
        }
        graphs.push(host);
    }

    let max_body_size = config
        .graphs
        .iter()
        .map(|graph| graph.max_body_size)
        .max()
        .unwrap_or(common::config::DEFAULT_MAX_BODY_SIZE);

    let router = web::Data::new(GraphQLRouter::new(config.clone(), graphs));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::new(
                middleware::TrailingSlash::Trim,
            ))
            .configure(configure_router(router.clone(), max_body_size))
    });

    match server.bind((config.host.as_str(), config.port)) {
        Ok(server) => {
            let pretty_addr = pretty_addr(&server.addrs());

            println!(
                "Started server on {} in {:.2} ms",
                pretty_addr,
                start_time
                    .elapsed()
                    .map(|elapsed| elapsed.as_micros() as f64 / 1000.0)
                    .unwrap_or_default()
            );
            print_graph_info(&config, &pretty_addr);

            let result = server.run().await;
            drop(watchers);
            Ok(result?)
        }
        Err(e) => Err(if e.kind() == ErrorKind::AddrInUse {
            ServerError::PortInUse(config.port)
        } else {
            ServerError::Io(e)
        }),
    }
}

fn print_graph_info(config: &ServerConfig, pretty_addr: &str) {
    for graph in &config.graphs {
        let addr = match &graph.server_name {
            Some(server_name) => format!("{server_name}:{}", config.port),
            None => pretty_addr.to_string(),
        };

        println!("- {} ({}):", graph.label(), graph.document_root.display());
        println!("\tGraphQL endpoint: http://{addr}{}", config.graphql_http_path);
        if graph.graphiql {
            println!("\tGraphiQL: http://{addr}{}", config.graphiql_http_path);
        }
        if graph.hot_reload {
            println!("\tWatching for changes");
        }
    }
}

fn pretty_addr(addrs: &[SocketAddr]) -> String {
    let loopback_addr = addrs.iter().find(|addr| addr.ip().is_loopback());

    match loopback_addr {
        Some(addr) => format!("localhost:{}", addr.port()),
        None => match addrs {
            // Print single address without square brackets
            [addr] => format!("{addr}"),
            _ => {
                format!("{addrs:?}")
            }
        },
    }
}
