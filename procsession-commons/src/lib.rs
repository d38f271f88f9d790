//! Small helpers that sit next to `procsession` rather than inside it: whole
//! file reads and writes, and a wrapper that logs failures through `tracing`
//! before handing them back.

pub mod errors;
pub mod fs;

pub use errors::{Disposition, any_failure, log_failure};
pub use fs::{FOLDER_MODE, slurp, spit};
