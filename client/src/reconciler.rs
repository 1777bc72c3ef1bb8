//! Startup (and on-demand) reconciliation: classifies every path known to
//! either side into client-only, server-only, matching, or mismatched, then
//! resolves the safe cases automatically and fails hard on the rest.

use std::path::Path;

use textsync_core::{fs_io::write_through, path::RelPath, ChecksumIndex, TextCache, TextFile, TextSyncError};
use tracing::{info, warn};

use crate::rpc::RpcClient;

/// Outcome of comparing the client's and server's checksum indexes.
struct Classification {
    client_only: Vec<RelPath>,
    server_only: Vec<RelPath>,
    mismatched: Vec<RelPath>,
}

fn classify(client: &ChecksumIndex, server: &ChecksumIndex) -> Classification {
    let mut client_only = Vec::new();
    let mut server_only = Vec::new();
    let mut mismatched = Vec::new();

    for (path, sum) in client {
        match server.get(path) {
            None => client_only.push(path.clone()),
            Some(server_sum) if server_sum != sum => mismatched.push(path.clone()),
            Some(_) => {}
        }
    }
    for path in server.keys() {
        if !client.contains_key(path) {
            server_only.push(path.clone());
        }
    }

    client_only.sort();
    server_only.sort();
    mismatched.sort();
    Classification {
        client_only,
        server_only,
        mismatched,
    }
}

pub struct Reconciler;

impl Reconciler {
    /// Pushes client-only files, pulls server-only files — writing each
    /// pulled file to `root` as well as to `cache` — and fails with
    /// `ContentDivergence` if any shared path's checksum disagrees. Safe
    /// mode only: no content is ever overwritten without a human deciding,
    /// so a mismatch aborts rather than picking a side.
    pub async fn auto_resolve<R, W>(
        root: &Path,
        cache: &mut TextCache,
        rpc: &mut RpcClient<R, W>,
    ) -> Result<(), TextSyncError>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let client_index = cache.snapshot();
        let server_index = rpc.get_file_hashes().await?;
        let plan = classify(&client_index, &server_index);

        if !plan.mismatched.is_empty() {
            return Err(TextSyncError::ContentDivergence(
                plan.mismatched.iter().map(|p| p.to_string()).collect(),
            ));
        }

        if !plan.client_only.is_empty() {
            info!(count = plan.client_only.len(), "pushing client-only files");
            let files: Vec<TextFile> = plan
                .client_only
                .iter()
                .filter_map(|path| {
                    cache.get(path).map(|content| TextFile {
                        path: path.clone(),
                        content: content.clone(),
                    })
                })
                .collect();
            if !files.is_empty() {
                rpc.send_text_files(files).await?;
            }
        }

        if !plan.server_only.is_empty() {
            info!(count = plan.server_only.len(), "pulling server-only files");
            let pulled = rpc.get_text_files(plan.server_only).await?;
            for file in pulled {
                let abs = file.path.under(root);
                if let Err(e) = write_through(&abs, &file.content) {
                    warn!(path = %file.path, error = %e, "failed to write pulled file to disk");
                    return Err(TextSyncError::io(file.path.to_string(), e));
                }
                cache.put(file.path, file.content);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn idx(pairs: &[(&str, u64)]) -> ChecksumIndex {
        pairs
            .iter()
            .map(|(p, sum)| (RelPath::new(*p).unwrap(), *sum))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn classifies_client_only_and_server_only_and_matches() {
        let client = idx(&[("a.txt", 1), ("shared.txt", 42)]);
        let server = idx(&[("b.txt", 2), ("shared.txt", 42)]);
        let plan = classify(&client, &server);
        assert_eq!(plan.client_only, vec![RelPath::new("a.txt").unwrap()]);
        assert_eq!(plan.server_only, vec![RelPath::new("b.txt").unwrap()]);
        assert!(plan.mismatched.is_empty());
    }

    #[test]
    fn classifies_mismatched_content() {
        let client = idx(&[("shared.txt", 1)]);
        let server = idx(&[("shared.txt", 2)]);
        let plan = classify(&client, &server);
        assert_eq!(plan.mismatched, vec![RelPath::new("shared.txt").unwrap()]);
        assert!(plan.client_only.is_empty());
        assert!(plan.server_only.is_empty());
    }

    async fn fake_server_with_one_file(mut server_r: tokio::io::DuplexStream, mut server_w: tokio::io::DuplexStream) {
        use textsync_core::{framing, Request, Response};

        loop {
            let req: Request = match framing::read_message(&mut server_r).await.unwrap() {
                Some(r) => r,
                None => break,
            };
            let resp = match req {
                Request::GetFileHashes => {
                    let mut index = ChecksumIndex::new();
                    index.insert(
                        RelPath::new("remote-only.txt").unwrap(),
                        textsync_core::checksum::checksum("from server"),
                    );
                    Response::Hashes(index)
                }
                Request::GetTextFiles(paths) => Response::TextFiles(
                    paths
                        .into_iter()
                        .map(|path| TextFile {
                            path,
                            content: "from server".to_string(),
                        })
                        .collect(),
                ),
                _ => Response::Ok,
            };
            framing::write_message(&mut server_w, &resp).await.unwrap();
        }
    }

    #[tokio::test]
    async fn pulled_server_only_files_land_on_disk_and_in_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (client_w, server_r) = tokio::io::duplex(8192);
        let (server_w, client_r) = tokio::io::duplex(8192);
        tokio::spawn(fake_server_with_one_file(server_r, server_w));

        let mut rpc = RpcClient::new(client_r, client_w);
        let mut cache = TextCache::new();
        Reconciler::auto_resolve(dir.path(), &mut cache, &mut rpc)
            .await
            .unwrap();

        assert_eq!(
            cache.get(&RelPath::new("remote-only.txt").unwrap()).unwrap(),
            "from server"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("remote-only.txt")).unwrap(),
            "from server"
        );
    }
}
