// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fs::File,
    io,
    os::fd::AsRawFd,
    path::Path,
    process::{Output, Stdio},
    time::Duration,
};

use tokio::{io::AsyncWriteExt, process::Command};

use crate::error::ResolverError;

/// The descriptor under which resolvers find the request context
pub const CONTEXT_FD: i32 = 3;

/// Make `file` available to the child as descriptor 3. The file must stay open until the child
/// has been spawned.
pub(crate) fn pass_as_context_fd(command: &mut Command, file: &File) {
    let fd = file.as_raw_fd();

    // SAFETY: the closure runs between fork and exec and only makes async-signal-safe calls
    unsafe {
        command.pre_exec(move || {
            if fd == CONTEXT_FD {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                    return Err(io::Error::last_os_error());
                }
            } else if libc::dup2(fd, CONTEXT_FD) < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Spawn `command`, feed it `input` and collect its output. The child is killed if it outlives
/// `timeout` or if the returned future is dropped.
pub(crate) async fn run(
    mut command: Command,
    input: Option<Vec<u8>>,
    path: &Path,
    timeout: Duration,
) -> Result<Output, ResolverError> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| ResolverError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;

    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            match stdin.write_all(&input).await {
                // The child may exit without reading its input
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
        }
        Ok::<_, io::Error>(())
    };

    let (fed, output) = tokio::time::timeout(
        timeout,
        futures::future::join(feed, child.wait_with_output()),
    )
    .await
    .map_err(|_| ResolverError::Timeout {
        path: path.to_path_buf(),
        timeout,
    })?;

    fed?;
    Ok(output?)
}

pub(crate) fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim_end().to_string()
}
