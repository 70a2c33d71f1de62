//! Durable replacement of the on-disk PID record.

use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Replaces the record at `path` with `pid` followed by a newline.
///
/// The record is staged in a hidden sibling, synced, and renamed over the
/// target, so a concurrent reader sees either the old record or the new one.
/// On Unix the directory is synced too, making the rename itself durable.
pub(super) fn write_pid_record(path: &Path, pid: u32) -> io::Result<()> {
    let Some(directory) = path.parent() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "pid record path has no parent directory",
        ));
    };
    let prefix = match path.file_name() {
        Some(name) => format!(".{}.", name.to_string_lossy()),
        None => String::from(".pid."),
    };

    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let mut staged = builder.tempfile_in(directory)?;
    writeln!(staged, "{pid}")?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    sync_directory(directory)
}

#[cfg(unix)]
fn sync_directory(directory: &Path) -> io::Result<()> {
    std::fs::File::open(directory)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_directory: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn replaces_existing_record_without_leftovers() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("svc.pid");
        fs::write(&path, "1\n").expect("seed file");

        write_pid_record(&path, 42).expect("write record");

        assert_eq!(fs::read_to_string(&path).expect("read back"), "42\n");
        let entries = fs::read_dir(dir.path()).expect("list dir").count();
        assert_eq!(entries, 1, "temporary file should be renamed into place");
    }

    #[test]
    fn missing_parent_directory_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("absent").join("svc.pid");
        let error = write_pid_record(&path, 1).expect_err("write should fail");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
