//! Invocation configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use crate::process_group::KillSignal;

/// Exit code meaning normal success.
pub const SUCCESS_EXIT_CODE: i32 = 0;

/// What to do with one of the child's output streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OutputMode {
    /// Pipe the stream and return its bytes in the result.
    #[default]
    Capture,
    /// Connect the stream to the null device.
    Discard,
    /// Share the caller's stream.
    Inherit,
}

impl OutputMode {
    pub fn is_captured(self) -> bool {
        matches!(self, OutputMode::Capture)
    }

    pub(crate) fn stdio(self) -> Stdio {
        match self {
            OutputMode::Capture => Stdio::piped(),
            OutputMode::Discard => Stdio::null(),
            OutputMode::Inherit => Stdio::inherit(),
        }
    }
}

impl From<bool> for OutputMode {
    fn from(capture: bool) -> Self {
        if capture {
            OutputMode::Capture
        } else {
            OutputMode::Discard
        }
    }
}

/// Source of the child's standard input.
#[derive(Debug, Default)]
pub enum StdinSource {
    /// Immediate end-of-input.
    #[default]
    Null,
    /// Written in full, then the pipe is closed.
    Bytes(Vec<u8>),
    /// A caller-owned handle connected directly to the child.
    Stream(Stdio),
}

impl StdinSource {
    /// Pass an open file straight through as the child's stdin.
    pub fn file(file: File) -> Self {
        StdinSource::Stream(Stdio::from(file))
    }
}

impl From<Vec<u8>> for StdinSource {
    fn from(bytes: Vec<u8>) -> Self {
        StdinSource::Bytes(bytes)
    }
}

impl From<&[u8]> for StdinSource {
    fn from(bytes: &[u8]) -> Self {
        StdinSource::Bytes(bytes.to_vec())
    }
}

impl From<&str> for StdinSource {
    fn from(text: &str) -> Self {
        StdinSource::Bytes(text.as_bytes().to_vec())
    }
}

impl From<File> for StdinSource {
    fn from(file: File) -> Self {
        StdinSource::file(file)
    }
}

/// Caller code run in the child between `fork` and `exec`. Unix only.
pub struct PreExecHook(Box<dyn FnMut() -> io::Result<()> + Send + Sync>);

impl PreExecHook {
    pub(crate) fn from_fn<F>(hook: F) -> Self
    where
        F: FnMut() -> io::Result<()> + Send + Sync + 'static,
    {
        Self(Box::new(hook))
    }

    pub(crate) fn run(&mut self) -> io::Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for PreExecHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PreExecHook(..)")
    }
}

/// Options for a single [`call`](crate::call).
///
/// ```
/// use procsession::{InvocationOptions, KillSignal};
///
/// let options = InvocationOptions::new()
///     .capture_stderr(false)
///     .stdin("hello")
///     .env("LANG", "C")
///     .accept_exit_codes([0, 1])
///     .kill_signal(KillSignal::Term);
/// assert!(options.accepts(1));
/// ```
#[derive(Debug)]
pub struct InvocationOptions {
    pub kill_signal: KillSignal,
    pub stdout: OutputMode,
    pub stderr: OutputMode,
    pub stdin: StdinSource,
    pub working_directory: Option<PathBuf>,
    /// Merged over the inherited environment.
    pub environment: BTreeMap<OsString, OsString>,
    /// Codes treated as success. Empty disables the check.
    pub accepted_exit_codes: BTreeSet<i32>,
    /// Extra `CreateProcess` flags, OR-ed with `CREATE_NEW_PROCESS_GROUP`. Windows only.
    pub creation_flags: u32,
    /// Deliver `SIGTERM` to the child if the spawning thread exits. Linux only.
    pub parent_death_signal: bool,
    /// Runs after the child has joined its new session. Ignored on Windows.
    pub pre_exec: Option<PreExecHook>,
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self {
            kill_signal: KillSignal::strongest(),
            stdout: OutputMode::Capture,
            stderr: OutputMode::Capture,
            stdin: StdinSource::Null,
            working_directory: None,
            environment: BTreeMap::new(),
            accepted_exit_codes: BTreeSet::from([SUCCESS_EXIT_CODE]),
            creation_flags: 0,
            parent_death_signal: false,
            pre_exec: None,
        }
    }
}

impl InvocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill_signal(mut self, signal: KillSignal) -> Self {
        self.kill_signal = signal;
        self
    }

    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.stdout = OutputMode::from(capture);
        self
    }

    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.stderr = OutputMode::from(capture);
        self
    }

    pub fn stdout_mode(mut self, mode: OutputMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn stderr_mode(mut self, mode: OutputMode) -> Self {
        self.stderr = mode;
        self
    }

    pub fn stdin(mut self, source: impl Into<StdinSource>) -> Self {
        self.stdin = source.into();
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the accepted exit codes.
    pub fn accept_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accepted_exit_codes = codes.into_iter().collect();
        self
    }

    /// Treat every exit code as success.
    pub fn accept_any_exit_code(mut self) -> Self {
        self.accepted_exit_codes.clear();
        self
    }

    pub fn creation_flags(mut self, flags: u32) -> Self {
        self.creation_flags = flags;
        self
    }

    pub fn parent_death_signal(mut self, enabled: bool) -> Self {
        self.parent_death_signal = enabled;
        self
    }

    /// Run `hook` in the child after it has left the caller's session and
    /// before `exec`. An error from the hook fails the launch.
    ///
    /// # Safety
    ///
    /// The hook runs in a forked copy of a possibly multi-threaded process.
    /// It must only do what is async-signal-safe: no allocation, no locks,
    /// and no touching of state another thread may hold. See
    /// `std::os::unix::process::CommandExt::pre_exec`.
    pub unsafe fn pre_exec<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> io::Result<()> + Send + Sync + 'static,
    {
        self.pre_exec = Some(PreExecHook::from_fn(hook));
        self
    }

    /// Whether `exit_code` counts as success under these options.
    pub fn accepts(&self, exit_code: i32) -> bool {
        self.accepted_exit_codes.is_empty() || self.accepted_exit_codes.contains(&exit_code)
    }
}
