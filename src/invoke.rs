//! The `call` entry points.
//!
//! A call runs four stages in order: resolve the executable, launch it as a
//! session leader, exchange I/O until the leader exits, then kill whatever is
//! left of the session and reap the leader. The final stage runs on every
//! path out of the exchange, including cancellation (see [`Session`]).
//!
//! [`Session`]: crate::process::Session

use std::borrow::Cow;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tracing::{Instrument, debug, debug_span};

use crate::error::{InvokeError, Result};
use crate::exchange::exchange;
use crate::launch::launch;
use crate::options::{InvocationOptions, StdinSource};
use crate::resolve::resolve_executable;

/// Outcome of a call whose exit code was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedInvocation {
    /// The command as the caller passed it.
    pub command: Vec<OsString>,
    /// Exit code, or the negated signal number if the process was killed.
    pub exit_code: i32,
    /// Empty unless stdout was captured.
    pub stdout: Vec<u8>,
    /// Empty unless stderr was captured.
    pub stderr: Vec<u8>,
}

impl CompletedInvocation {
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Shell-quoted rendering of the command, for display.
    pub fn command_line(&self) -> String {
        render_command_line(&self.command)
    }
}

/// Run `command` to completion.
///
/// The first element is the logical command name, resolved on `PATH`; the
/// rest are passed as arguments. Every process the command starts is killed
/// and the leader reaped before this returns. Dropping the returned future
/// tears the session down the same way.
///
/// ```no_run
/// # async fn demo() -> procsession::Result<()> {
/// use procsession::{InvocationOptions, call};
///
/// let done = call(["echo", "hello"], InvocationOptions::new()).await?;
/// assert_eq!(done.stdout, b"hello\n");
/// # Ok(())
/// # }
/// ```
pub fn call<I, S>(
    command: I,
    options: InvocationOptions,
) -> impl Future<Output = Result<CompletedInvocation>> + Send
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let command: Vec<OsString> = command.into_iter().map(Into::into).collect();
    let span = debug_span!("call", command = %render_command_line(&command));
    run(command, options).instrument(span)
}

/// Blocking variant of [`call`] for callers without a runtime.
///
/// Must not be called from within an async context.
pub fn call_blocking<I, S>(command: I, options: InvocationOptions) -> Result<CompletedInvocation>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let command: Vec<OsString> = command.into_iter().map(Into::into).collect();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| InvokeError::LaunchFailed {
            program: command.first().map(PathBuf::from).unwrap_or_default(),
            source,
        })?;
    runtime.block_on(call(command, options))
}

async fn run(command: Vec<OsString>, mut options: InvocationOptions) -> Result<CompletedInvocation> {
    let Some((name, args)) = command.split_first() else {
        return Err(InvokeError::CommandNotFound {
            command: OsString::new(),
        });
    };

    let program = resolve_executable(name)?;

    let (stdin, input) = match std::mem::take(&mut options.stdin) {
        StdinSource::Null => (Stdio::null(), None),
        StdinSource::Bytes(bytes) => (Stdio::piped(), Some(bytes)),
        StdinSource::Stream(handle) => (handle, None),
    };

    let pre_exec = options.pre_exec.take();
    let mut session = launch(&program, args, &options, stdin, pre_exec)?;
    let pid = session.pid();

    let exchanged = exchange(&mut session, input).await;

    let status = session
        .reap()
        .await
        .map_err(|source| InvokeError::ReapFailed { pid, source })?;
    let exit_code = exit_code_of(exchanged.status.unwrap_or(status));

    if !options.accepts(exit_code) {
        debug!(pid, exit_code, "exit code not accepted");
        return Err(InvokeError::NonZeroExit {
            command,
            exit_code,
            stdout: exchanged.stdout,
            stderr: exchanged.stderr,
        });
    }

    debug!(pid, exit_code, "call completed");
    Ok(CompletedInvocation {
        command,
        exit_code,
        stdout: exchanged.stdout,
        stderr: exchanged.stderr,
    })
}

/// Numeric exit code, with signal deaths reported as `-signal`.
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

pub(crate) fn render_command_line(command: &[OsString]) -> String {
    command
        .iter()
        .map(|arg| shell_escape::escape(arg.to_string_lossy()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let command: Vec<OsString> = vec!["echo".into(), "hello world".into()];
        assert_eq!(render_command_line(&command), "echo 'hello world'");
    }

    #[test]
    fn empty_command_renders_empty() {
        assert_eq!(render_command_line(&[]), "");
    }

    #[cfg(unix)]
    #[test]
    fn signal_deaths_are_negated() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), -9);
        assert_eq!(exit_code_of(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[tokio::test]
    async fn empty_command_is_not_found() {
        let err = call(Vec::<OsString>::new(), InvocationOptions::new())
            .await
            .expect_err("empty command");
        assert_eq!(err.kind(), crate::ErrorKind::CommandNotFound);
    }

    #[test]
    fn completed_invocation_helpers() {
        let done = CompletedInvocation {
            command: vec!["printf".into(), "a b".into()],
            exit_code: 0,
            stdout: b"out".to_vec(),
            stderr: vec![0xff],
        };
        assert_eq!(done.stdout_lossy(), "out");
        assert_eq!(done.stderr_lossy(), "\u{fffd}");
        assert_eq!(done.command_line(), "printf 'a b'");
    }
}
