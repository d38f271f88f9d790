//! Failure logging for fallible operations.

use std::error::Error;
use std::fmt::Write as _;

use tracing::error;

/// What [`log_failure`] does with an error after logging it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the error back to the caller.
    #[default]
    Propagate,
    /// Swallow every error, logged or not, and return `Ok(None)`.
    Suppress,
}

/// Filter accepting every error.
pub fn any_failure<E: ?Sized>(_error: &E) -> bool {
    true
}

/// Log `result`'s error through `tracing::error!` when `filter` accepts it,
/// then propagate or suppress it according to `disposition`.
///
/// Successful values come back as `Ok(Some(value))`.
///
/// ```
/// use procsession_commons::{Disposition, any_failure, log_failure};
///
/// let parsed = log_failure("12".parse::<u8>(), any_failure, Disposition::Propagate);
/// assert_eq!(parsed, Ok(Some(12)));
///
/// let dropped = log_failure("nope".parse::<u8>(), any_failure, Disposition::Suppress);
/// assert_eq!(dropped, Ok(None));
/// ```
pub fn log_failure<T, E, F>(
    result: Result<T, E>,
    filter: F,
    disposition: Disposition,
) -> Result<Option<T>, E>
where
    E: Error,
    F: FnOnce(&E) -> bool,
{
    let err = match result {
        Ok(value) => return Ok(Some(value)),
        Err(err) => err,
    };

    if filter(&err) {
        error!(error = %err, causes = %render_causes(&err), "operation failed");
    }

    match disposition {
        Disposition::Propagate => Err(err),
        Disposition::Suppress => Ok(None),
    }
}

fn render_causes(err: &dyn Error) -> String {
    let mut rendered = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        if !rendered.is_empty() {
            rendered.push_str(": ");
        }
        let _ = write!(rendered, "{cause}");
        source = cause.source();
    }
    rendered
}
