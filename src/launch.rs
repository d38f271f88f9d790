//! Spawning a resolved program as the leader of a fresh process session.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{InvokeError, Result};
use crate::options::{InvocationOptions, PreExecHook};
use crate::process::Session;
#[cfg(unix)]
use crate::process_group;

/// Start `program` with `args` in its own session (Unix) or process group
/// (Windows), wired to the stdio described by `options`.
///
/// `stdin` and `pre_exec` are passed separately because the spawn consumes
/// them: a [`StdinSource::Stream`] handle and the caller's hook move into the
/// child.
///
/// [`StdinSource::Stream`]: crate::StdinSource::Stream
pub(crate) fn launch(
    program: &Path,
    args: &[OsString],
    options: &InvocationOptions,
    stdin: Stdio,
    pre_exec: Option<PreExecHook>,
) -> Result<Session> {
    let mut command = Command::new(program);
    command.args(args);

    if let Some(dir) = &options.working_directory {
        command.current_dir(dir);
    }
    command.envs(&options.environment);

    command
        .stdin(stdin)
        .stdout(options.stdout.stdio())
        .stderr(options.stderr.stdio())
        .kill_on_drop(true);

    isolate(&mut command, options, pre_exec);

    let launch_failed = |source: io::Error| InvokeError::LaunchFailed {
        program: program.to_path_buf(),
        source,
    };

    let child = command.spawn().map_err(launch_failed)?;
    let pid = child
        .id()
        .ok_or_else(|| launch_failed(io::Error::other("spawned child has no pid")))?;

    debug!(
        pid,
        program = %program.display(),
        cwd = ?options.working_directory,
        "launched process session"
    );

    Ok(Session::new(child, pid, options.kill_signal))
}

#[cfg(unix)]
fn isolate(command: &mut Command, options: &InvocationOptions, pre_exec: Option<PreExecHook>) {
    #[cfg(target_os = "linux")]
    let parent_pid = unsafe { libc::getpid() };
    #[cfg(target_os = "linux")]
    let parent_death_signal = options.parent_death_signal;
    #[cfg(not(target_os = "linux"))]
    let _ = options;

    let mut hook = pre_exec;
    unsafe {
        command.pre_exec(move || {
            process_group::detach_from_tty()?;
            #[cfg(target_os = "linux")]
            if parent_death_signal {
                process_group::set_parent_death_signal(parent_pid)?;
            }
            if let Some(hook) = hook.as_mut() {
                hook.run()?;
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn isolate(command: &mut Command, options: &InvocationOptions, pre_exec: Option<PreExecHook>) {
    if pre_exec.is_some() {
        debug!("pre-exec hook ignored on Windows");
    }
    command.creation_flags(crate::process_group::CREATE_NEW_PROCESS_GROUP | options.creation_flags);
}

#[cfg(not(any(unix, windows)))]
fn isolate(_command: &mut Command, _options: &InvocationOptions, _pre_exec: Option<PreExecHook>) {}
