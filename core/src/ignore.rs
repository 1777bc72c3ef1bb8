use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::path::RelPath;

/// Text-file suffixes tracked by default. A closed set; callers who need
/// more pass their own list to [`IgnorePolicy::new`].
pub const DEFAULT_TRACKED_SUFFIXES: &[&str] = &[
    ".c", ".h", ".cpp", ".hpp", ".go", ".hs", ".cl", ".js", ".md", ".txt",
];

/// Noise directories excluded from tracking regardless of suffix.
pub const DEFAULT_NOISE_PREFIXES: &[&str] = &[".git", ".idea", "node_modules", "target"];

/// Pure predicate classifying a path as tracked or ignored.
///
/// Directories are never "ignored" by this predicate alone: callers
/// consult [`IgnorePolicy::prune_dir`] separately when deciding whether to
/// recurse, and [`IgnorePolicy::ignore`] when deciding whether to include a
/// file.
pub struct IgnorePolicy {
    tracked_suffixes: Vec<String>,
    noise_dirs: GlobSet,
}

impl IgnorePolicy {
    pub fn new(tracked_suffixes: Vec<String>, noise_prefixes: Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        for prefix in &noise_prefixes {
            let pat = format!("{prefix}/**");
            if let Ok(g) = Glob::new(&pat) {
                builder.add(g);
            }
            if let Ok(g) = Glob::new(prefix) {
                builder.add(g);
            }
        }
        let noise_dirs = builder
            .build()
            .unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty globset"));
        Self {
            tracked_suffixes,
            noise_dirs,
        }
    }

    /// True if any path component under `path` falls under a noise prefix.
    pub fn prune_dir(&self, path: &RelPath) -> bool {
        self.noise_dirs.is_match(path.as_str())
    }

    /// True if `path` should be excluded from tracking.
    pub fn ignore(&self, path: &RelPath) -> bool {
        if self.prune_dir(path) {
            return true;
        }
        !self
            .tracked_suffixes
            .iter()
            .any(|suffix| path.as_str().ends_with(suffix.as_str()))
    }
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRACKED_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_NOISE_PREFIXES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_known_suffixes() {
        let policy = IgnorePolicy::default();
        assert!(!policy.ignore(&RelPath::new("src/main.go").unwrap()));
        assert!(!policy.ignore(&RelPath::new("README.md").unwrap()));
        assert!(policy.ignore(&RelPath::new("image.png").unwrap()));
    }

    #[test]
    fn ignores_noise_directories_regardless_of_suffix() {
        let policy = IgnorePolicy::default();
        assert!(policy.ignore(&RelPath::new(".git/HEAD.txt").unwrap()));
        assert!(policy.ignore(&RelPath::new("target/debug/build.js").unwrap()));
    }

    #[test]
    fn prune_dir_matches_noise_prefix_itself() {
        let policy = IgnorePolicy::default();
        assert!(policy.prune_dir(&RelPath::new(".git").unwrap()));
        assert!(!policy.prune_dir(&RelPath::new("src").unwrap()));
    }
}
