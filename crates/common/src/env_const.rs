// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use treeql_env::Environment;

pub const TREEQL_CONFIG: &str = "TREEQL_CONFIG";

pub const TREEQL_LOG: &str = "TREEQL_LOG";
pub const TREEQL_LOG_FORMAT: &str = "TREEQL_LOG_FORMAT"; // "compact" (default) or "json"

pub const TREEQL_SERVER_HOST: &str = "TREEQL_SERVER_HOST";
pub const TREEQL_SERVER_PORT: &str = "TREEQL_SERVER_PORT";
pub const TREEQL_GRAPHQL_HTTP_PATH: &str = "TREEQL_GRAPHQL_HTTP_PATH";
pub const TREEQL_GRAPHIQL_HTTP_PATH: &str = "TREEQL_GRAPHIQL_HTTP_PATH";

pub const TREEQL_ROOT: &str = "TREEQL_ROOT";
pub const TREEQL_SERVER_NAME: &str = "TREEQL_SERVER_NAME";
pub const TREEQL_HOT: &str = "TREEQL_HOT";
pub const TREEQL_GRAPHIQL: &str = "TREEQL_GRAPHIQL";
pub const TREEQL_RESOLVER_DIR: &str = "TREEQL_RESOLVER_DIR";
pub const TREEQL_CTX_EXEC_PATH: &str = "TREEQL_CTX_EXEC_PATH";
pub const TREEQL_CTX_FILES_DIR: &str = "TREEQL_CTX_FILES_DIR";
pub const TREEQL_MAX_BODY_SIZE: &str = "TREEQL_MAX_BODY_SIZE";
pub const TREEQL_RESOLVER_TIMEOUT_SECS: &str = "TREEQL_RESOLVER_TIMEOUT_SECS";
pub const TREEQL_DISCOVERY_TIMEOUT_SECS: &str = "TREEQL_DISCOVERY_TIMEOUT_SECS";
pub const TREEQL_BASIC_AUTH_USERNAME: &str = "TREEQL_BASIC_AUTH_USERNAME";
pub const TREEQL_BASIC_AUTH_PASSWORD: &str = "TREEQL_BASIC_AUTH_PASSWORD";

pub const DEFAULT_ROOT: &str = "/var/treeql";
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8080;

pub fn get_graphql_http_path(env: &dyn Environment) -> String {
    env.get(TREEQL_GRAPHQL_HTTP_PATH)
        .unwrap_or_else(|| "/".to_string())
}

pub fn get_graphiql_http_path(env: &dyn Environment) -> String {
    env.get(TREEQL_GRAPHIQL_HTTP_PATH)
        .unwrap_or_else(|| "/graphiql".to_string())
}
