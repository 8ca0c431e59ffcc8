// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Mutex, PoisonError};

use cgi_resolver::{CgiEnvironment, ContextFile, ResponseHeaders};
use common::http::Headers;

/// Request-scoped state shared by every resolver invoked while executing one operation
pub struct RequestData {
    pub environment: CgiEnvironment,
    pub context: Option<ContextFile>,
    pub response_headers: ResponseHeaders,
}

impl RequestData {
    pub fn new(environment: CgiEnvironment, context: Option<ContextFile>) -> Self {
        Self {
            environment,
            context,
            response_headers: Mutex::new(Headers::new()),
        }
    }

    /// Headers emitted by resolvers so far
    pub fn take_response_headers(&self) -> Headers {
        std::mem::take(
            &mut *self
                .response_headers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
