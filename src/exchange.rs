//! Overlapped stdin delivery and output collection.

use std::io::ErrorKind;
use std::process::ExitStatus;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tracing::debug;

use crate::process::Session;

const READ_CHUNK: usize = 8_192;

/// What the exchange stage observed.
#[derive(Debug, Default)]
pub(crate) struct Exchanged {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status of the leader, when waiting succeeded.
    pub status: Option<ExitStatus>,
}

/// Feed `input` to the child while draining both output pipes, then wait for
/// the leader to exit.
///
/// The three transfers run concurrently so a child blocked writing one pipe
/// can never stall the others. I/O failures here are logged and otherwise
/// swallowed; the exit status is what classifies the call.
pub(crate) async fn exchange(session: &mut Session, input: Option<Vec<u8>>) -> Exchanged {
    let pid = session.pid();
    let child = session.child_mut();
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let ((), stdout, stderr) = tokio::join!(
        deliver_input(stdin, input, pid),
        drain(stdout, "stdout", pid),
        drain(stderr, "stderr", pid),
    );

    let status = match child.wait().await {
        Ok(status) => Some(status),
        Err(err) => {
            debug!(pid, error = %err, "waiting for leader failed during exchange");
            None
        }
    };

    debug!(
        pid,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "exchange finished"
    );

    Exchanged {
        stdout,
        stderr,
        status,
    }
}

async fn deliver_input(stdin: Option<ChildStdin>, input: Option<Vec<u8>>, pid: u32) {
    let Some(mut stdin) = stdin else {
        return;
    };

    if let Some(bytes) = input {
        if let Err(err) = stdin.write_all(&bytes).await {
            // Broken pipe when the child stops reading early.
            debug!(pid, error = %err, "stdin write stopped");
            return;
        }
    }

    if let Err(err) = stdin.shutdown().await {
        debug!(pid, error = %err, "closing stdin failed");
    }
}

async fn drain<R>(reader: Option<R>, stream: &'static str, pid: u32) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Vec::new();
    };

    let mut collected = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(buf.get(..n).unwrap_or_default()),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(pid, stream, error = %err, "output read stopped");
                break;
            }
        }
    }
    collected
}
