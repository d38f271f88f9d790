//! Typed failures for a single invocation.
//!
//! Each variant is a distinct [`ErrorKind`] so that wrappers higher up (for
//! example `procsession_commons::log_failure`) can filter on the kind without
//! matching on message text.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::invoke::render_command_line;

/// Maximum number of stderr bytes echoed in a `NonZeroExit` display string.
const STDERR_DISPLAY_LIMIT: usize = 2_048;

/// Failure raised by [`call`](crate::call).
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No executable matches the logical name anywhere on the search path.
    #[error("command not found: {}", .command.to_string_lossy())]
    CommandNotFound { command: OsString },

    /// A matching file exists but the current user cannot execute it.
    #[error("permission denied: {} is not executable", .path.display())]
    PermissionDenied { path: PathBuf },

    /// The OS refused to create the process.
    #[error("failed to launch {}: {source}", .program.display())]
    LaunchFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process ran to completion with an exit code outside the accepted set.
    #[error("{}", describe_non_zero_exit(.command, .exit_code, .stderr))]
    NonZeroExit {
        command: Vec<OsString>,
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    /// Waiting for the process leader to be reaped failed.
    #[error("failed to reap process {pid}: {source}")]
    ReapFailed {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Discriminant of [`InvokeError`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    CommandNotFound,
    PermissionDenied,
    LaunchFailed,
    NonZeroExit,
    ReapFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::CommandNotFound => "command not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::LaunchFailed => "launch failed",
            ErrorKind::NonZeroExit => "non-zero exit",
            ErrorKind::ReapFailed => "reap failed",
        };
        f.write_str(name)
    }
}

impl InvokeError {
    /// The kind of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokeError::CommandNotFound { .. } => ErrorKind::CommandNotFound,
            InvokeError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            InvokeError::LaunchFailed { .. } => ErrorKind::LaunchFailed,
            InvokeError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            InvokeError::ReapFailed { .. } => ErrorKind::ReapFailed,
        }
    }

    /// Short stable identifier for logs and telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            InvokeError::CommandNotFound { .. } => "PROC001",
            InvokeError::PermissionDenied { .. } => "PROC002",
            InvokeError::LaunchFailed { .. } => "PROC003",
            InvokeError::NonZeroExit { .. } => "PROC004",
            InvokeError::ReapFailed { .. } => "PROC005",
        }
    }

    /// Exit code of the process, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            InvokeError::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured stderr, when the process ran to completion.
    pub fn stderr(&self) -> Option<&[u8]> {
        match self {
            InvokeError::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn describe_non_zero_exit(command: &[OsString], exit_code: &i32, stderr: &[u8]) -> String {
    let mut message = format!(
        "command `{}` exited with code {exit_code}",
        render_command_line(command)
    );

    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if !text.is_empty() {
        let shown: String = text.chars().take(STDERR_DISPLAY_LIMIT).collect();
        message.push_str(": ");
        message.push_str(&shown);
        if shown.len() < text.len() {
            message.push_str("...");
        }
    }

    message
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, InvokeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn non_zero(stderr: &[u8]) -> InvokeError {
        InvokeError::NonZeroExit {
            command: vec!["false".into(), "--flag".into()],
            exit_code: 1,
            stdout: Vec::new(),
            stderr: stderr.to_vec(),
        }
    }

    #[test]
    fn kinds_and_codes_are_distinct() {
        let errors = [
            InvokeError::CommandNotFound {
                command: "nope".into(),
            },
            InvokeError::PermissionDenied {
                path: PathBuf::from("/tmp/script"),
            },
            InvokeError::LaunchFailed {
                program: PathBuf::from("/bin/x"),
                source: io::Error::other("boom"),
            },
            non_zero(b""),
            InvokeError::ReapFailed {
                pid: 42,
                source: io::Error::other("gone"),
            },
        ];

        let kinds: std::collections::HashSet<_> = errors.iter().map(InvokeError::kind).collect();
        let codes: std::collections::HashSet<_> = errors.iter().map(InvokeError::code).collect();
        assert_eq!(kinds.len(), errors.len());
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn command_not_found_carries_logical_name() {
        let err = InvokeError::CommandNotFound {
            command: "definitely-missing".into(),
        };
        assert_eq!(err.to_string(), "command not found: definitely-missing");
        assert_eq!(err.kind(), ErrorKind::CommandNotFound);
        assert!(err.exit_code().is_none());
    }

    #[test]
    fn non_zero_exit_display_includes_code_and_stderr() {
        let err = non_zero(b"something broke\n");
        let text = err.to_string();
        assert!(text.contains("exited with code 1"), "{text}");
        assert!(text.contains("false --flag"), "{text}");
        assert!(text.ends_with("something broke"), "{text}");
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.stderr(), Some(&b"something broke\n"[..]));
    }

    #[test]
    fn non_zero_exit_display_without_stderr() {
        let err = non_zero(b"  \n");
        assert_eq!(err.to_string(), "command `false --flag` exited with code 1");
    }

    #[test]
    fn launch_failed_exposes_source() {
        let err = InvokeError::LaunchFailed {
            program: PathBuf::from("/bin/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert_eq!(err.kind().to_string(), "launch failed");
    }
}
