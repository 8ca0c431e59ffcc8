// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fs::Metadata,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use core_model::schema::QUERY_TYPE;

pub const DECLARATION_EXTENSION: &str = "graphql";

/// A file under the document root that contributes to the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaFile {
    /// An executable whose fields belong to `object`
    Executable { path: PathBuf, object: String },
    /// A declaration-language document
    Declaration { path: PathBuf },
}

impl SchemaFile {
    pub fn path(&self) -> &Path {
        match self {
            SchemaFile::Executable { path, .. } | SchemaFile::Declaration { path } => path,
        }
    }
}

/// Decide what (if anything) `path` contributes to the schema.
///
/// A `.graphql` file is a declaration file even if it carries an execute bit. Any other
/// non-directory entry with an execute bit is a resolver owned by its parent directory's object;
/// executables directly under `root` belong to `Query`.
pub fn classify(root: &Path, path: &Path, metadata: &Metadata) -> Option<SchemaFile> {
    if metadata.is_dir() {
        return None;
    }

    if path.extension().and_then(|ext| ext.to_str()) == Some(DECLARATION_EXTENSION) {
        return Some(SchemaFile::Declaration {
            path: path.to_path_buf(),
        });
    }

    if metadata.permissions().mode() & 0o111 == 0 {
        return None;
    }

    let parent = path.parent()?;
    let object = if parent == root {
        QUERY_TYPE.to_string()
    } else {
        parent.file_name()?.to_str()?.to_string()
    };

    Some(SchemaFile::Executable {
        path: path.to_path_buf(),
        object,
    })
}
