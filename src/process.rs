//! Owned handle for a running process session.
//!
//! A [`Session`] exists from the moment the child is spawned until it has
//! been reaped. Whatever path the call takes out of the exchange stage, the
//! session is either reaped explicitly through [`Session::reap`] or torn down
//! by its `Drop` impl when the call future is abandoned.

use std::fmt;
use std::io;
use std::process::ExitStatus;

use tokio::process::Child;
use tracing::{debug, warn};

use crate::process_group::{KillSignal, SessionTerminator, platform_terminator};

pub(crate) struct Session {
    child: Child,
    pid: u32,
    terminator: Box<dyn SessionTerminator>,
    kill_signal: KillSignal,
    reaped: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.pid)
            .field("kill_signal", &self.kill_signal)
            .field("reaped", &self.reaped)
            .finish()
    }
}

impl Session {
    pub(crate) fn new(child: Child, pid: u32, kill_signal: KillSignal) -> Self {
        Self::with_terminator(child, pid, kill_signal, Box::new(platform_terminator(pid)))
    }

    pub(crate) fn with_terminator(
        child: Child,
        pid: u32,
        kill_signal: KillSignal,
        terminator: Box<dyn SessionTerminator>,
    ) -> Self {
        Self {
            child,
            pid,
            terminator,
            kill_signal,
            reaped: false,
        }
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Signal the whole session, then wait for the leader's exit status.
    pub(crate) async fn reap(&mut self) -> io::Result<ExitStatus> {
        self.terminate();
        let status = self.child.wait().await?;
        self.reaped = true;
        debug!(pid = self.pid, %status, "session reaped");
        Ok(status)
    }

    /// Deliver the kill signal to every process in the session.
    ///
    /// An already-exited session is not an error. If the OS refuses the
    /// group-wide signal, only the immediate child is killed.
    fn terminate(&mut self) {
        match self.terminator.terminate(self.kill_signal) {
            Ok(()) => {
                debug!(pid = self.pid, signal = %self.kill_signal, "signalled process session");
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                debug!(
                    pid = self.pid,
                    error = %err,
                    "session signal denied; killing the leader directly"
                );
                if let Err(err) = self.child.start_kill() {
                    // Already exited and reaped by the exchange stage.
                    debug!(pid = self.pid, error = %err, "direct kill skipped");
                }
            }
            Err(err) => {
                warn!(pid = self.pid, error = %err, "failed to signal process session");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }

        debug!(pid = self.pid, "call abandoned before reaping; tearing down session");
        self.terminate();

        // One non-blocking check. A leader that has not exited yet is reaped
        // by the runtime through `kill_on_drop`.
        match self.child.try_wait() {
            Ok(Some(status)) => debug!(pid = self.pid, %status, "abandoned session reaped"),
            Ok(None) => debug!(pid = self.pid, "leaving abandoned leader to the runtime reaper"),
            Err(err) => debug!(pid = self.pid, error = %err, "try_wait failed during teardown"),
        }
    }
}
