//! Shared initial-walk logic: both the server (at construction) and the
//! client (at startup, before reconciliation) populate a [`TextCache`] by
//! walking a root directory through an [`IgnorePolicy`].

use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::cache::TextCache;
use crate::error::TextSyncError;
use crate::ignore::IgnorePolicy;
use crate::path::RelPath;

pub fn walk_tracked(root: &Path, ignore: &IgnorePolicy) -> Result<TextCache, TextSyncError> {
    let mut cache = TextCache::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        match RelPath::try_from(rel) {
            Ok(rel) => !(entry.file_type().is_dir() && ignore.prune_dir(&rel)),
            Err(_) => false,
        }
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            TextSyncError::io(
                root.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match RelPath::try_from(entry.path().strip_prefix(root).unwrap_or(entry.path())) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if ignore.ignore(&rel) {
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => cache.put(rel, content),
            Err(e) => warn!(path = %rel, error = %e, "skipping unreadable tracked file"),
        }
    }
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_text_files_and_skips_noise_dirs() {
        let dir = tempdir();
        std::fs::write(dir.join("a.txt"), "hi").unwrap();
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        std::fs::write(dir.join(".git/HEAD.txt"), "ref").unwrap();

        let cache = walk_tracked(&dir, &IgnorePolicy::default()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&RelPath::new("a.txt").unwrap()).is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "textsync-walk-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
