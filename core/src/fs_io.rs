//! Shared disk-write helper: both the server (applying `SendTextFile`/
//! `ApplyDeltas`) and the client (writing pulled files during reconciliation)
//! need the identical "create parent dirs, write, set 0644" sequence.

use std::path::Path;

/// Writes `content` to `path` with permission bits `0644`, creating missing
/// parent directories.
pub fn write_through(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    set_permissions(path)
}

#[cfg(unix)]
fn set_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
