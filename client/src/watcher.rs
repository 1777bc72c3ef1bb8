//! Client-side watcher: a debounced state machine over filesystem events
//! that keeps the remote tree converged by issuing `ApplyDeltas` and
//! `DeleteFiles` batches.
//!
//! States: `Idle` (nothing pending), `Pending` (a batch is accumulating,
//! debounce timer armed), `Sending` (an RPC for the current batch is in
//! flight, always awaited to completion), `Retry` (the last send failed;
//! the same computed deltas are held and resent verbatim, while a fresh
//! batch accumulates independently on its own debounce window), `Stopped`.
//! The debounce window is one-shot: once armed by the first event in an
//! otherwise-empty batch, later events in the same window coalesce into it
//! but never push the deadline back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{info, warn};

use textsync_core::{cache::TextCache, delta, delta::Delta, ignore::IgnorePolicy, path::RelPath};

use crate::rpc::RpcClient;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Modified,
    Removed,
}

/// Pending set of changed paths, coalesced by path (last write wins) with a
/// one-shot debounce deadline armed on the first event of an otherwise-empty
/// batch.
#[derive(Default)]
struct DebounceBatch {
    changes: BTreeMap<RelPath, Change>,
    deadline: Option<Instant>,
}

impl DebounceBatch {
    fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records one path's change, arming the deadline only on the
    /// empty-to-non-empty transition. Never slides an already-armed
    /// deadline.
    fn note(&mut self, path: RelPath, change: Change, now: Instant) {
        let was_empty = self.changes.is_empty();
        self.changes.insert(path, change);
        if was_empty {
            self.deadline = Some(now + DEBOUNCE_WINDOW);
        }
    }

    fn due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if now >= d) && !self.is_empty()
    }

    fn take(&mut self) -> BTreeMap<RelPath, Change> {
        self.deadline = None;
        std::mem::take(&mut self.changes)
    }
}

enum WatcherInput {
    Fs(Event),
    Stop,
}

/// A batch whose deltas have already been computed against the cache and are
/// ready to send. Held verbatim across retries: a failed send must not be
/// recomputed, since the cache it would diff against may no longer reflect
/// the state the server is actually at.
#[derive(Default)]
struct PreparedBatch {
    /// `(path, delta-to-send)`, cleared (and the matching cache update
    /// committed) once `ApplyDeltas` for it has succeeded.
    deltas: Vec<(RelPath, Delta)>,
    /// Content to commit to the cache for each entry in `deltas`, indexed in
    /// lockstep.
    cache_updates: Vec<(RelPath, String)>,
    /// Paths to delete, cleared once `DeleteFiles` has succeeded.
    removed: Vec<RelPath>,
}

impl PreparedBatch {
    fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.removed.is_empty()
    }
}

/// Drives the debounce state machine for one local tree, pushing batches of
/// deltas (and deletions) to `rpc` as they settle.
pub struct ClientWatcher<R, W> {
    root: PathBuf,
    ignore: IgnorePolicy,
    cache: TextCache,
    rpc: RpcClient<R, W>,
    watched_dirs: std::collections::HashSet<PathBuf>,
}

impl<R, W> ClientWatcher<R, W>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(root: PathBuf, ignore: IgnorePolicy, cache: TextCache, rpc: RpcClient<R, W>) -> Self {
        Self {
            root,
            ignore,
            cache,
            rpc,
            watched_dirs: std::collections::HashSet::new(),
        }
    }

    /// Runs until the channel yields `Stop` or is dropped. Registers the
    /// root and every currently-tracked file's parent directory up front;
    /// directories created later are registered lazily on first event.
    pub async fn run(mut self) -> Result<(), textsync_core::TextSyncError> {
        let (tx, mut rx) = mpsc::channel::<WatcherInput>(256);
        let watcher = Arc::new(Mutex::new(self.spawn_notify_watcher(tx.clone())?));
        self.register_initial_dirs(&watcher).await;

        let mut batch = DebounceBatch::default();
        let mut retry: Option<PreparedBatch> = None;
        let mut tick = tokio::time::interval(Duration::from_millis(50));

        loop {
            tokio::select! {
                input = rx.recv() => {
                    match input {
                        Some(WatcherInput::Fs(event)) => {
                            self.record_event(&watcher, &mut batch, event).await;
                        }
                        Some(WatcherInput::Stop) | None => {
                            info!("watcher stopping");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    // A held retry always takes priority: the cache cannot
                    // safely diverge further from what the server has while
                    // an earlier batch's outcome is still unresolved.
                    if let Some(mut pending) = retry.take() {
                        match self.send_prepared(&mut pending).await {
                            Ok(()) => {}
                            Err(e) => {
                                warn!(error = %e, "retry failed, will try again next tick");
                                retry = Some(pending);
                            }
                        }
                    } else if batch.due(Instant::now()) {
                        let due = batch.take();
                        let mut prepared = self.prepare_batch(due).await;
                        match self.send_prepared(&mut prepared).await {
                            Ok(()) => {}
                            Err(e) => {
                                warn!(error = %e, "batch send failed, will retry");
                                retry = Some(prepared);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn record_event(
        &mut self,
        watcher: &Arc<Mutex<RecommendedWatcher>>,
        batch: &mut DebounceBatch,
        event: Event,
    ) {
        let now = Instant::now();
        for abs_path in &event.paths {
            let rel = match abs_path.strip_prefix(&self.root).ok().and_then(|p| RelPath::try_from(p).ok()) {
                Some(rel) => rel,
                None => continue,
            };
            if self.ignore.ignore(&rel) {
                continue;
            }
            if abs_path.is_dir() {
                self.register_dir_if_new(watcher, abs_path).await;
                continue;
            }
            let change = match event.kind {
                EventKind::Remove(_) => Change::Removed,
                EventKind::Create(_) | EventKind::Modify(_) => Change::Modified,
                _ => continue,
            };
            batch.note(rel, change, now);
        }
    }

    /// Reads fresh content off disk for every modified path and diffs it
    /// against the cache, without mutating the cache. The cache is only
    /// updated once the server has confirmed it applied the corresponding
    /// delta, in `send_prepared`; this keeps a failed send's `PreparedBatch`
    /// resendable byte-for-byte on retry.
    async fn prepare_batch(&self, due: BTreeMap<RelPath, Change>) -> PreparedBatch {
        let mut prepared = PreparedBatch::default();
        for (path, change) in due {
            match change {
                Change::Modified => {
                    let abs = path.under(&self.root);
                    let content = match tokio::fs::read_to_string(&abs).await {
                        Ok(c) => c,
                        Err(_) => continue, // raced with a delete; will show up as Removed separately
                    };
                    let base = self.cache.get(&path).cloned().unwrap_or_default();
                    let delta = delta::diff(&base, &content);
                    prepared.deltas.push((path.clone(), delta));
                    prepared.cache_updates.push((path, content));
                }
                Change::Removed => prepared.removed.push(path),
            }
        }
        prepared
    }

    /// Sends whatever is left in `prepared`, awaited to completion — never
    /// raced against incoming filesystem events, so a partially-written
    /// length-prefixed frame can never be abandoned mid-write. Concurrent
    /// events simply queue in the channel and are drained by the next loop
    /// iteration once this call returns.
    ///
    /// Each half (deltas, then deletes) is cleared from `prepared`, and its
    /// matching cache update committed, as soon as it succeeds — so a
    /// failure partway through leaves only the unsent remainder for the
    /// caller to retry, rather than resending an already-applied half.
    async fn send_prepared(&mut self, prepared: &mut PreparedBatch) -> Result<(), textsync_core::TextSyncError> {
        if !prepared.deltas.is_empty() {
            self.rpc.apply_deltas(prepared.deltas.clone()).await?;
            for (path, content) in prepared.cache_updates.drain(..) {
                self.cache.put(path, content);
            }
            prepared.deltas.clear();
        }
        if !prepared.removed.is_empty() {
            self.rpc.delete_files(prepared.removed.clone()).await?;
            for path in prepared.removed.drain(..) {
                self.cache.remove(&path);
            }
        }
        Ok(())
    }

    fn spawn_notify_watcher(
        &self,
        tx: mpsc::Sender<WatcherInput>,
    ) -> Result<RecommendedWatcher, textsync_core::TextSyncError> {
        notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(WatcherInput::Fs(event));
            }
        })
        .map_err(|e| textsync_core::TextSyncError::Protocol(format!("failed to start watcher: {e}")))
    }

    async fn register_initial_dirs(&self, watcher: &Arc<Mutex<RecommendedWatcher>>) {
        let mut dirs = std::collections::HashSet::new();
        dirs.insert(self.root.clone());
        for path in self.cache.paths() {
            if let Some(parent) = path.under(&self.root).parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
        let mut w = watcher.lock().await;
        for dir in dirs {
            if let Err(e) = w.watch(&dir, RecursiveMode::NonRecursive) {
                warn!(dir = %dir.display(), error = %e, "failed to register watch");
            }
        }
    }

    async fn register_dir_if_new(&mut self, watcher: &Arc<Mutex<RecommendedWatcher>>, dir: &Path) {
        if self.watched_dirs.contains(dir) {
            return;
        }
        let mut w = watcher.lock().await;
        if w.watch(dir, RecursiveMode::NonRecursive).is_ok() {
            self.watched_dirs.insert(dir.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn first_event_arms_the_deadline() {
        let mut batch = DebounceBatch::default();
        let now = Instant::now();
        assert!(batch.deadline.is_none());
        batch.note(rel("a.txt"), Change::Modified, now);
        assert!(batch.deadline.is_some());
    }

    #[test]
    fn later_events_in_the_window_do_not_push_the_deadline_back() {
        let mut batch = DebounceBatch::default();
        let now = Instant::now();
        batch.note(rel("a.txt"), Change::Modified, now);
        let first_deadline = batch.deadline.unwrap();
        batch.note(rel("b.txt"), Change::Modified, now + Duration::from_millis(50));
        assert_eq!(batch.deadline.unwrap(), first_deadline);
    }

    #[test]
    fn coalesces_repeated_changes_to_the_same_path() {
        let mut batch = DebounceBatch::default();
        let now = Instant::now();
        batch.note(rel("a.txt"), Change::Modified, now);
        batch.note(rel("a.txt"), Change::Removed, now);
        assert_eq!(batch.changes.len(), 1);
        assert_eq!(batch.changes[&rel("a.txt")], Change::Removed);
    }

    #[test]
    fn due_is_false_until_the_deadline_passes() {
        let mut batch = DebounceBatch::default();
        let now = Instant::now();
        batch.note(rel("a.txt"), Change::Modified, now);
        assert!(!batch.due(now));
        assert!(batch.due(now + DEBOUNCE_WINDOW));
    }

    #[test]
    fn take_clears_the_batch_and_deadline() {
        let mut batch = DebounceBatch::default();
        let now = Instant::now();
        batch.note(rel("a.txt"), Change::Modified, now);
        let taken = batch.take();
        assert_eq!(taken.len(), 1);
        assert!(batch.is_empty());
        assert!(batch.deadline.is_none());
    }

    fn watcher_over(
        root: PathBuf,
        cache: TextCache,
        client_r: tokio::io::DuplexStream,
        client_w: tokio::io::DuplexStream,
    ) -> ClientWatcher<tokio::io::DuplexStream, tokio::io::DuplexStream> {
        let rpc = RpcClient::new(client_r, client_w);
        ClientWatcher::new(root, IgnorePolicy::default(), cache, rpc)
    }

    /// A fake server whose `ApplyDeltas` handler fails the first `fail_times`
    /// calls (reporting `DeltaMismatch`, a fixed wire error unrelated to the
    /// payload) before succeeding, recording every delta byte-string it was
    /// sent.
    async fn flaky_apply_deltas_server(
        mut server_r: tokio::io::DuplexStream,
        mut server_w: tokio::io::DuplexStream,
        fail_times: usize,
        seen: std::sync::Arc<std::sync::Mutex<Vec<Vec<String>>>>,
    ) {
        use textsync_core::{framing, Request, Response, WireError};

        let mut calls = 0usize;
        loop {
            let req: Request = match framing::read_message(&mut server_r).await.unwrap() {
                Some(r) => r,
                None => break,
            };
            let resp = match req {
                Request::ApplyDeltas(batch) => {
                    let bytes: Vec<String> = batch.iter().map(|(_, d)| d.as_str().to_string()).collect();
                    seen.lock().unwrap().push(bytes);
                    calls += 1;
                    if calls <= fail_times {
                        Response::Err(WireError::DeltaMismatch(vec!["a.txt".to_string()]))
                    } else {
                        Response::Ok
                    }
                }
                _ => Response::Ok,
            };
            framing::write_message(&mut server_w, &resp).await.unwrap();
        }
    }

    #[tokio::test]
    async fn failed_send_is_not_recomputed_and_cache_updates_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "updated-once").unwrap();

        let (client_w, server_r) = tokio::io::duplex(8192);
        let (server_w, client_r) = tokio::io::duplex(8192);
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        tokio::spawn(flaky_apply_deltas_server(server_r, server_w, 1, seen.clone()));

        let mut cache = TextCache::new();
        cache.put(rel("a.txt"), "base".to_string());
        let mut watcher = watcher_over(dir.path().to_path_buf(), cache, client_r, client_w);

        let mut due = BTreeMap::new();
        due.insert(rel("a.txt"), Change::Modified);
        let mut prepared = watcher.prepare_batch(due).await;

        assert!(watcher.send_prepared(&mut prepared).await.is_err());
        // Cache must still hold the pre-send content: the send failed.
        assert_eq!(watcher.cache.get(&rel("a.txt")).unwrap(), "base");
        assert!(!prepared.is_empty());

        // Retried verbatim, without recomputing against the (unchanged)
        // cache: both attempts must have carried the identical delta.
        assert!(watcher.send_prepared(&mut prepared).await.is_ok());
        assert_eq!(watcher.cache.get(&rel("a.txt")).unwrap(), "updated-once");
        assert!(prepared.is_empty());

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }
}
