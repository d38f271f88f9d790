//! Whole-file helpers.

use std::fs;
use std::io;
use std::path::Path;

/// Mode for directories created by [`spit`]. Unix only.
pub const FOLDER_MODE: u32 = 0o755;

/// Read a whole UTF-8 file.
pub fn slurp(path: impl AsRef<Path>) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Write `contents` to `path`, replacing it, and create missing parent
/// directories with [`FOLDER_MODE`] first.
pub fn spit(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_folders(parent)?;
    }
    fs::write(path, contents)
}

fn create_folders(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(FOLDER_MODE);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[test]
    fn spit_creates_parents_and_slurp_reads_back() {
        let temp = TempDir::new().expect("tempdir");
        let target = temp.child("a/b/c/notes.txt");

        spit(target.path(), "first line\n").expect("write");
        target.assert("first line\n");
        assert_eq!(slurp(target.path()).expect("read"), "first line\n");
    }

    #[test]
    fn spit_replaces_existing_contents() {
        let temp = TempDir::new().expect("tempdir");
        let target = temp.child("file.bin");
        target.write_str("old contents that are longer").expect("seed");

        spit(target.path(), [1u8, 2, 3]).expect("write");
        assert_eq!(std::fs::read(target.path()).expect("read"), vec![1, 2, 3]);
    }

    #[test]
    fn slurp_missing_file_is_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let err = slurp(temp.child("absent.txt").path()).expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn created_folders_use_folder_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("tempdir");
        let target = temp.child("made/by/spit.txt");
        spit(target.path(), "x").expect("write");

        let mode = std::fs::metadata(temp.child("made").path())
            .expect("metadata")
            .permissions()
            .mode();
        // The process umask can only clear bits.
        assert_eq!(mode & 0o777 & !FOLDER_MODE, 0);
        assert_ne!(mode & 0o700, 0);
    }
}
