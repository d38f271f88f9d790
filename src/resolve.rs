//! Executable resolution.
//!
//! Two lookups keep "not installed" apart from "installed but not
//! executable": the first asks `which` for an executable match, the second
//! only checks that some regular file answers to the name.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{InvokeError, Result};

/// Resolve `name` against the current `PATH` and working directory.
pub fn resolve_executable(name: impl AsRef<OsStr>) -> Result<PathBuf> {
    let name = name.as_ref();
    let search_path = std::env::var_os("PATH");
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_executable_in(name, search_path.as_deref(), &cwd)
}

/// Resolve `name` against an explicit search path and working directory.
///
/// Names containing a path separator are checked directly (relative ones
/// against `cwd`). Bare names are looked up in each `search_path` entry.
pub fn resolve_executable_in(
    name: impl AsRef<OsStr>,
    search_path: Option<&OsStr>,
    cwd: &Path,
) -> Result<PathBuf> {
    let name = name.as_ref();
    if name.is_empty() {
        return Err(InvokeError::CommandNotFound {
            command: OsString::new(),
        });
    }

    match which::which_in(name, search_path, cwd) {
        Ok(path) => {
            debug!(command = %name.to_string_lossy(), path = %path.display(), "resolved executable");
            Ok(path)
        }
        Err(err) => match find_existing(name, search_path, cwd) {
            Some(path) => {
                debug!(
                    command = %name.to_string_lossy(),
                    path = %path.display(),
                    "found a match that is not executable"
                );
                Err(InvokeError::PermissionDenied { path })
            }
            None => {
                debug!(command = %name.to_string_lossy(), error = %err, "no match on search path");
                Err(InvokeError::CommandNotFound {
                    command: name.to_os_string(),
                })
            }
        },
    }
}

/// Existence-only lookup mirroring the executable search order.
fn find_existing(name: &OsStr, search_path: Option<&OsStr>, cwd: &Path) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if has_path_separator(candidate) {
        let full = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            cwd.join(candidate)
        };
        return candidate_paths(&full).into_iter().find(|p| is_regular(p));
    }

    std::env::split_paths(search_path?)
        .map(|dir| {
            if dir.is_relative() {
                cwd.join(dir)
            } else {
                dir
            }
        })
        .flat_map(|dir| candidate_paths(&dir.join(candidate)))
        .find(|p| is_regular(p))
}

fn has_path_separator(path: &Path) -> bool {
    path.is_absolute() || path.components().count() > 1
}

fn is_regular(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| !meta.is_dir())
}

#[cfg(not(windows))]
fn candidate_paths(base: &Path) -> Vec<PathBuf> {
    vec![base.to_path_buf()]
}

/// The bare path plus every `PATHEXT` suffix.
#[cfg(windows)]
fn candidate_paths(base: &Path) -> Vec<PathBuf> {
    let pathext = std::env::var_os("PATHEXT")
        .map(|raw| raw.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".COM;.EXE;.BAT;.CMD".to_string());

    let mut candidates = vec![base.to_path_buf()];
    for ext in pathext.split(';').filter(|ext| !ext.is_empty()) {
        let mut with_ext = base.as_os_str().to_os_string();
        with_ext.push(ext);
        candidates.push(PathBuf::from(with_ext));
    }
    candidates
}
