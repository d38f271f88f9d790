//! Process-group helpers for reliable cleanup of a spawned session.
//!
//! This module centralizes the OS-specific pieces behind one contract:
//! - `detach_from_tty` runs in `pre_exec` and makes the child the leader of a
//!   new session (and therefore a new process group).
//! - `set_parent_death_signal` (Linux only) asks the kernel to send `SIGTERM`
//!   to the child when the spawning thread goes away.
//! - [`SessionTerminator`] delivers the kill signal to everything the child
//!   spawned. On Unix that is `killpg` on the session's group. On Windows,
//!   where no group-wide kill exists, it terminates the child directly.
//!
//! Callers pick [`PlatformTerminator`] and never branch on the platform.

use std::fmt;
use std::io;
use std::str::FromStr;

/// Windows `CREATE_NEW_PROCESS_GROUP` launch flag.
#[cfg(windows)]
pub const CREATE_NEW_PROCESS_GROUP: u32 = winapi::um::winbase::CREATE_NEW_PROCESS_GROUP;

/// Signal delivered to the process session during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum KillSignal {
    /// SIGINT - interrupt (Ctrl+C equivalent)
    Int,
    /// SIGTERM - allows graceful shutdown
    Term,
    /// SIGKILL - immediate termination
    Kill,
}

impl KillSignal {
    /// Teardown preference, strongest first.
    pub const PREFERENCE: [KillSignal; 2] = [KillSignal::Kill, KillSignal::Term];

    /// Whether the current platform can deliver this signal.
    pub const fn is_available(self) -> bool {
        match self {
            KillSignal::Kill => cfg!(unix),
            KillSignal::Term | KillSignal::Int => true,
        }
    }

    /// The strongest available terminate-now signal.
    ///
    /// `SIGKILL` where it exists, `SIGTERM` otherwise.
    pub const fn strongest() -> Self {
        if KillSignal::PREFERENCE[0].is_available() {
            KillSignal::PREFERENCE[0]
        } else {
            KillSignal::PREFERENCE[1]
        }
    }

    /// Conventional name, e.g. `SIGKILL`.
    pub const fn name(self) -> &'static str {
        match self {
            KillSignal::Int => "SIGINT",
            KillSignal::Term => "SIGTERM",
            KillSignal::Kill => "SIGKILL",
        }
    }

    #[cfg(unix)]
    fn as_nix_signal(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;

        match self {
            KillSignal::Int => Signal::SIGINT,
            KillSignal::Term => Signal::SIGTERM,
            KillSignal::Kill => Signal::SIGKILL,
        }
    }
}

impl Default for KillSignal {
    fn default() -> Self {
        KillSignal::strongest()
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown signal name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kill signal `{0}` (expected int, term or kill)")]
pub struct ParseKillSignalError(String);

impl FromStr for KillSignal {
    type Err = ParseKillSignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let bare = normalized.strip_prefix("SIG").unwrap_or(&normalized);
        match bare {
            "INT" | "2" => Ok(KillSignal::Int),
            "TERM" | "15" => Ok(KillSignal::Term),
            "KILL" | "9" => Ok(KillSignal::Kill),
            _ => Err(ParseKillSignalError(s.to_string())),
        }
    }
}

/// Ensure the child receives SIGTERM when the original parent dies.
///
/// This should run in `pre_exec` and uses `parent_pid` captured before spawn to
/// avoid a race where the parent exits between fork and exec.
#[cfg(target_os = "linux")]
pub fn set_parent_death_signal(parent_pid: libc::pid_t) -> io::Result<()> {
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::getppid() } != parent_pid {
        unsafe {
            libc::raise(libc::SIGTERM);
        }
    }

    Ok(())
}

/// Start a new session so the child leads its own process group and has no
/// controlling terminal.
#[cfg(unix)]
pub fn detach_from_tty() -> io::Result<()> {
    let result = unsafe { libc::setsid() };
    if result == -1 {
        let err = io::Error::last_os_error();
        // EPERM means we're already a group leader, fall back to setpgid
        if err.raw_os_error() == Some(libc::EPERM) {
            return set_process_group();
        }
        return Err(err);
    }
    Ok(())
}

/// Put the calling process into its own process group.
#[cfg(unix)]
pub fn set_process_group() -> io::Result<()> {
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Delivers the kill signal to a spawned session.
///
/// Implementations treat an already-exited target as success. A refusal by
/// the OS is reported as [`io::ErrorKind::PermissionDenied`] so the caller can
/// fall back to killing the immediate child.
pub trait SessionTerminator: Send + Sync {
    /// Signal every process in the session.
    fn terminate(&self, signal: KillSignal) -> io::Result<()>;
}

/// Signals a whole Unix process group with `killpg`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroupTerminator {
    process_group_id: u32,
}

#[cfg(unix)]
impl ProcessGroupTerminator {
    pub fn new(process_group_id: u32) -> Self {
        Self { process_group_id }
    }

    pub fn process_group_id(&self) -> u32 {
        self.process_group_id
    }
}

#[cfg(unix)]
impl SessionTerminator for ProcessGroupTerminator {
    fn terminate(&self, signal: KillSignal) -> io::Result<()> {
        kill_process_group_with_signal(self.process_group_id, signal)
    }
}

/// Terminates a single Windows process by PID.
#[cfg(windows)]
#[derive(Debug, Clone, Copy)]
pub struct DirectTerminator {
    pid: u32,
}

#[cfg(windows)]
impl DirectTerminator {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

#[cfg(windows)]
impl SessionTerminator for DirectTerminator {
    fn terminate(&self, _signal: KillSignal) -> io::Result<()> {
        kill_process(self.pid)
    }
}

/// Terminator selected for the build target.
#[cfg(unix)]
pub type PlatformTerminator = ProcessGroupTerminator;

/// Terminator selected for the build target.
#[cfg(windows)]
pub type PlatformTerminator = DirectTerminator;

/// Build the platform terminator for a freshly spawned session leader.
///
/// The leader's PID doubles as the session's process group ID because the
/// child called `setsid` before `exec`.
#[cfg(any(unix, windows))]
pub fn platform_terminator(leader_pid: u32) -> PlatformTerminator {
    PlatformTerminator::new(leader_pid)
}

/// Kill a specific process group ID with a specific signal.
///
/// `ESRCH` (the group no longer exists) is success.
#[cfg(unix)]
pub fn kill_process_group_with_signal(process_group_id: u32, signal: KillSignal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let pgid = libc::pid_t::try_from(process_group_id).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("process group id {process_group_id} out of range"),
        )
    })?;

    match killpg(Pid::from_raw(pgid), signal.as_nix_signal()) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Resolve the process group of a running process.
#[cfg(unix)]
pub fn process_group_of(pid: u32) -> io::Result<u32> {
    use nix::unistd::{Pid, getpgid};

    let raw = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let pgid = getpgid(Some(Pid::from_raw(raw))).map_err(io::Error::from)?;
    u32::try_from(pgid.as_raw())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative process group id"))
}

/// Kill a process by PID on Windows.
#[cfg(windows)]
pub fn kill_process(pid: u32) -> io::Result<()> {
    unsafe {
        let handle = winapi::um::processthreadsapi::OpenProcess(
            winapi::um::winnt::PROCESS_TERMINATE,
            0,
            pid,
        );
        if handle.is_null() {
            let err = io::Error::last_os_error();
            // ERROR_INVALID_PARAMETER: the process is already gone
            if err.raw_os_error() == Some(87) {
                return Ok(());
            }
            return Err(err);
        }
        let success = winapi::um::processthreadsapi::TerminateProcess(handle, 1);
        let err = io::Error::last_os_error();
        winapi::um::handleapi::CloseHandle(handle);
        if success == 0 { Err(err) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_signal_follows_preference() {
        let strongest = KillSignal::strongest();
        assert!(strongest.is_available());
        #[cfg(unix)]
        assert_eq!(strongest, KillSignal::Kill);
        #[cfg(not(unix))]
        assert_eq!(strongest, KillSignal::Term);
        assert_eq!(KillSignal::default(), strongest);
    }

    #[test]
    fn kill_signal_parses_common_spellings() {
        assert_eq!("kill".parse::<KillSignal>(), Ok(KillSignal::Kill));
        assert_eq!("SIGTERM".parse::<KillSignal>(), Ok(KillSignal::Term));
        assert_eq!(" sigint ".parse::<KillSignal>(), Ok(KillSignal::Int));
        assert_eq!("9".parse::<KillSignal>(), Ok(KillSignal::Kill));
        assert!("SIGHUP".parse::<KillSignal>().is_err());
    }

    #[test]
    fn kill_signal_display_uses_conventional_name() {
        assert_eq!(KillSignal::Kill.to_string(), "SIGKILL");
        assert_eq!(KillSignal::Term.to_string(), "SIGTERM");
    }

    #[cfg(unix)]
    #[test]
    fn killing_a_vanished_group_is_not_an_error() {
        // Far above any pid_max; the kernel answers ESRCH.
        let terminator = ProcessGroupTerminator::new(2_000_000_000);
        assert!(terminator.terminate(KillSignal::Kill).is_ok());
        assert!(terminator.terminate(KillSignal::Term).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn out_of_range_group_id_is_rejected() {
        let err = kill_process_group_with_signal(u32::MAX, KillSignal::Kill)
            .expect_err("u32::MAX does not fit in pid_t");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn process_group_of_self_matches_getpgrp() {
        let own = process_group_of(std::process::id()).expect("own process group");
        let expected = unsafe { libc::getpgrp() };
        assert_eq!(i64::from(own), i64::from(expected));
    }

    #[cfg(unix)]
    #[test]
    fn terminator_targets_the_leader_group() {
        let terminator = platform_terminator(4242);
        assert_eq!(terminator.process_group_id(), 4242);
    }
}
