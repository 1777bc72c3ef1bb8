use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TextSyncError;

/// A forward-slash-separated path relative to a peer's base directory.
///
/// `RelPath` is what rides the wire; peers translate to an absolute path
/// only at the filesystem boundary (see [`RelPath::under`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
    /// Builds a `RelPath`, rejecting absolute paths, backslashes, and `..`
    /// components that would let a peer escape its base directory.
    pub fn new(raw: impl Into<String>) -> Result<Self, TextSyncError> {
        let raw = raw.into();
        let normalized = raw.replace('\\', "/");
        if normalized.starts_with('/') || normalized.is_empty() {
            return Err(TextSyncError::Protocol(format!(
                "not a relative path: {raw:?}"
            )));
        }
        if normalized.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(TextSyncError::Protocol(format!(
                "unsafe path component in {raw:?}"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn under(&self, root: &std::path::Path) -> std::path::PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&std::path::Path> for RelPath {
    type Error = TextSyncError;

    fn try_from(p: &std::path::Path) -> Result<Self, Self::Error> {
        RelPath::new(p.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_and_traversal() {
        assert!(RelPath::new("/etc/passwd").is_err());
        assert!(RelPath::new("../secret.txt").is_err());
        assert!(RelPath::new("a/../b").is_err());
        assert!(RelPath::new("").is_err());
    }

    #[test]
    fn normalizes_backslashes() {
        let p = RelPath::new("dir\\file.txt").unwrap();
        assert_eq!(p.as_str(), "dir/file.txt");
    }

    #[test]
    fn accepts_plain_relative_path() {
        let p = RelPath::new("src/lib.rs").unwrap();
        assert_eq!(p.as_str(), "src/lib.rs");
    }
}
