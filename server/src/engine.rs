use std::path::PathBuf;

use textsync_core::{
    fs_io::write_through, path::RelPath, walk, IgnorePolicy, Request, Response, TextCache,
    TextFile, TextSyncError, WireError,
};
use tracing::{info, warn};

/// Applies incoming requests against the filesystem and its [`TextCache`];
/// answers queries. Constructed once at startup, then driven by the
/// request loop in `main` over decoded requests.
pub struct ServerEngine {
    root: PathBuf,
    ignore: IgnorePolicy,
    cache: TextCache,
}

impl ServerEngine {
    /// Walks `root`, applies the ignore policy, and populates the cache by
    /// reading each tracked file.
    pub fn new(root: PathBuf, ignore: IgnorePolicy) -> Result<Self, TextSyncError> {
        let cache = walk::walk_tracked(&root, &ignore)?;
        info!(count = cache.len(), root = %root.display(), "populated cache from initial walk");
        Ok(Self { root, ignore, cache })
    }

    pub fn ignore_policy(&self) -> &IgnorePolicy {
        &self.ignore
    }

    pub fn cache(&self) -> &TextCache {
        &self.cache
    }

    fn abs(&self, path: &RelPath) -> PathBuf {
        path.under(&self.root)
    }

    /// Handles one request, producing the matching response. Never panics
    /// on bad input; all failure is reported as `Response::Err`.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::GetTextFile(path) => match self.cache.get(&path) {
                Some(content) => Response::TextFile(content.clone()),
                None => Response::Err(WireError::NotFound(path.to_string())),
            },
            Request::GetTextFiles(paths) => {
                let files = paths
                    .into_iter()
                    .filter_map(|path| {
                        self.cache.get(&path).map(|content| TextFile {
                            path: path.clone(),
                            content: content.clone(),
                        })
                    })
                    .collect();
                Response::TextFiles(files)
            }
            Request::SendTextFile(file) => match self.send_text_file(file) {
                Ok(()) => Response::Ok,
                Err(e) => Response::Err(WireError::from(&e)),
            },
            Request::SendTextFiles(files) => {
                let mut failures = Vec::new();
                for file in files {
                    if let Err(e) = self.send_text_file(file) {
                        if let TextSyncError::Io { path, source } = e {
                            failures.push((path, source.to_string()));
                        }
                    }
                }
                if failures.is_empty() {
                    Response::Ok
                } else {
                    Response::Err(WireError::Io(failures))
                }
            }
            Request::GetFileHashes => Response::Hashes(self.cache.snapshot()),
            Request::ApplyDeltas(batch) => {
                let mut mismatched = Vec::new();
                let mut io_failures = Vec::new();
                for (path, delta) in batch {
                    let previous = self.cache.get(&path).cloned();
                    match self.cache.apply(&path, &delta) {
                        Ok(content) => {
                            let content = content.to_string();
                            if let Err(e) = write_through(&self.abs(&path), &content) {
                                warn!(path = %path, error = %e, "write-through failed after apply, reverting cache");
                                match previous {
                                    Some(prev) => self.cache.put(path.clone(), prev),
                                    None => self.cache.remove(&path),
                                }
                                io_failures.push((path.to_string(), e.to_string()));
                            }
                        }
                        Err(_) => mismatched.push(path.to_string()),
                    }
                }
                if !io_failures.is_empty() {
                    Response::Err(WireError::Io(io_failures))
                } else if !mismatched.is_empty() {
                    Response::Err(WireError::DeltaMismatch(mismatched))
                } else {
                    Response::Ok
                }
            }
            Request::DeleteFiles(paths) => {
                let mut failures = Vec::new();
                for path in paths {
                    self.cache.remove(&path);
                    match std::fs::remove_file(self.abs(&path)) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => failures.push((path.to_string(), e.to_string())),
                    }
                }
                if failures.is_empty() {
                    Response::Ok
                } else {
                    Response::Err(WireError::Io(failures))
                }
            }
        }
    }

    /// Cache update precedes disk write; on disk-write failure the cache is
    /// reverted to the pre-update content.
    fn send_text_file(&mut self, file: TextFile) -> Result<(), TextSyncError> {
        let previous = self.cache.get(&file.path).cloned();
        self.cache.put(file.path.clone(), file.content.clone());
        let abs = self.abs(&file.path);
        match write_through(&abs, &file.content) {
            Ok(()) => Ok(()),
            Err(e) => {
                match previous {
                    Some(content) => self.cache.put(file.path.clone(), content),
                    None => self.cache.remove(&file.path),
                }
                Err(TextSyncError::io(file.path.to_string(), e))
            }
        }
    }
}
