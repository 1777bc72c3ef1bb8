//! Spawns the server binary on a remote host over an interactive shell and
//! exposes its stdin/stdout as one duplex byte stream.
//!
//! Command construction follows the shape of launching a remote program
//! through `ssh`: the SSH client binary, connection options, the
//! `user@host` target, and the remote command line to execute, in that
//! order. No SSH protocol handling happens in this crate; an installed
//! `ssh` binary does the authenticated-shell work.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use std::pin::Pin;
use std::task::{Context, Poll};

use textsync_core::TextSyncError;

/// Connection parameters for reaching the remote host's textsync server.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Directory on the remote host the server should treat as its root.
    pub remote_dir: String,
}

/// A spawned `ssh` child process wired up as a single duplex stream.
///
/// Keeps the `Child` handle alive for the lifetime of the stream: dropping
/// it would kill the remote session.
pub struct Transport {
    child: Child,
    stdout: ChildStdout,
    stdin: ChildStdin,
}

impl Transport {
    /// Spawns `ssh` against `target`, launching `textsync-server` in
    /// `target.remote_dir` on the far side.
    pub fn connect(target: &RemoteTarget) -> Result<Self, TextSyncError> {
        let mut cmd = Command::new("ssh");
        if let Some(port) = target.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(Self::destination(target));
        cmd.arg(Self::remote_command(target));

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| TextSyncError::io(format!("ssh {}", target.host), e))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TextSyncError::Protocol("ssh child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TextSyncError::Protocol("ssh child has no stdout".into()))?;

        Ok(Self { child, stdout, stdin })
    }

    fn destination(target: &RemoteTarget) -> String {
        match &target.user {
            Some(user) => format!("{user}@{}", target.host),
            None => target.host.clone(),
        }
    }

    /// Remote command line: change into the served directory, then run the
    /// server. Quoted with single quotes; `remote_dir` is operator-supplied
    /// configuration, not attacker input, matching the trust boundary the
    /// transport already assumes.
    fn remote_command(target: &RemoteTarget) -> String {
        format!(
            "cd '{}' && textsync-server",
            target.remote_dir.replace('\'', "'\\''")
        )
    }

    /// Splits into independent read/write halves so a caller can frame in
    /// both directions concurrently, matching what `RpcClient` expects.
    pub fn into_split(self) -> (TransportRead, TransportWrite) {
        (
            TransportRead {
                stdout: self.stdout,
            },
            TransportWrite {
                stdin: self.stdin,
                _child: self.child,
            },
        )
    }
}

pub struct TransportRead {
    stdout: ChildStdout,
}

pub struct TransportWrite {
    stdin: ChildStdin,
    /// Holds the child alive; dropping this half terminates the session.
    _child: Child,
}

impl AsyncRead for TransportRead {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for TransportWrite {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
