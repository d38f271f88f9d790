//! # procsession
//!
//! Run an external command to completion with nothing left behind.
//!
//! Each [`call`] resolves the command on `PATH`, starts it as the leader of a
//! new session (a new process group on Windows), feeds it standard input while
//! draining both output streams concurrently, and finally kills the whole
//! session and reaps the leader. Grandchildren that outlive the command are
//! killed with it, and dropping the call future mid-flight does the same.
//!
//! ```no_run
//! # async fn demo() -> procsession::Result<()> {
//! use procsession::{ErrorKind, InvocationOptions, call};
//!
//! let out = call(["cat"], InvocationOptions::new().stdin("round trip")).await?;
//! assert_eq!(out.stdout_lossy(), "round trip");
//!
//! let err = call(["false"], InvocationOptions::new()).await.unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NonZeroExit);
//! assert_eq!(err.exit_code(), Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! Failures are typed by [`ErrorKind`]; see [`InvokeError`].

pub mod error;
mod exchange;
pub mod invoke;
mod launch;
pub mod logging;
pub mod options;
mod process;
pub mod process_group;
pub mod resolve;

pub use error::{ErrorKind, InvokeError, Result};
pub use invoke::{CompletedInvocation, call, call_blocking};
pub use options::{InvocationOptions, OutputMode, SUCCESS_EXIT_CODE, StdinSource};
pub use process_group::{KillSignal, ParseKillSignalError};
pub use resolve::{resolve_executable, resolve_executable_in};
