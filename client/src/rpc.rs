//! Client-side RPC issuance: one `call` per verb, each mapping the wire
//! `Response` back onto a typed result or a `TextSyncError`.
//!
//! At most one call is outstanding at a time by construction: `RpcClient`
//! takes `&mut self`, and ownership of the single instance moves from the
//! main task (startup, reconciliation) to the watcher task once steady
//! state begins, per the single-RPC-issuer discipline.

use tokio::io::{AsyncRead, AsyncWrite};

use textsync_core::{
    delta::Delta, framing, path::RelPath, ChecksumIndex, Request, Response, TextFile,
    TextSyncError,
};

pub struct RpcClient<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> RpcClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    async fn call(&mut self, request: Request) -> Result<Response, TextSyncError> {
        framing::write_message(&mut self.writer, &request).await?;
        framing::read_message(&mut self.reader)
            .await?
            .ok_or(TextSyncError::TransportClosed)
    }

    pub async fn get_text_file(&mut self, path: RelPath) -> Result<String, TextSyncError> {
        match self.call(Request::GetTextFile(path)).await? {
            Response::TextFile(content) => Ok(content),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to GetTextFile".into())),
        }
    }

    pub async fn get_text_files(&mut self, paths: Vec<RelPath>) -> Result<Vec<TextFile>, TextSyncError> {
        match self.call(Request::GetTextFiles(paths)).await? {
            Response::TextFiles(files) => Ok(files),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to GetTextFiles".into())),
        }
    }

    pub async fn send_text_file(&mut self, file: TextFile) -> Result<(), TextSyncError> {
        match self.call(Request::SendTextFile(file)).await? {
            Response::Ok => Ok(()),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to SendTextFile".into())),
        }
    }

    pub async fn send_text_files(&mut self, files: Vec<TextFile>) -> Result<(), TextSyncError> {
        match self.call(Request::SendTextFiles(files)).await? {
            Response::Ok => Ok(()),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to SendTextFiles".into())),
        }
    }

    pub async fn get_file_hashes(&mut self) -> Result<ChecksumIndex, TextSyncError> {
        match self.call(Request::GetFileHashes).await? {
            Response::Hashes(index) => Ok(index),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to GetFileHashes".into())),
        }
    }

    pub async fn apply_deltas(&mut self, batch: Vec<(RelPath, Delta)>) -> Result<(), TextSyncError> {
        match self.call(Request::ApplyDeltas(batch)).await? {
            Response::Ok => Ok(()),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to ApplyDeltas".into())),
        }
    }

    pub async fn delete_files(&mut self, paths: Vec<RelPath>) -> Result<(), TextSyncError> {
        match self.call(Request::DeleteFiles(paths)).await? {
            Response::Ok => Ok(()),
            Response::Err(e) => Err(e.into()),
            _ => Err(TextSyncError::Protocol("unexpected response to DeleteFiles".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textsync_core::TextCache;
    use tokio::io::DuplexStream;

    async fn fake_server(mut server_r: DuplexStream, mut server_w: DuplexStream) {
        let mut cache = TextCache::new();
        loop {
            let req: Request = match framing::read_message(&mut server_r).await.unwrap() {
                Some(r) => r,
                None => break,
            };
            let resp = match req {
                Request::GetFileHashes => Response::Hashes(cache.snapshot()),
                Request::SendTextFile(f) => {
                    cache.put(f.path, f.content);
                    Response::Ok
                }
                _ => Response::Ok,
            };
            framing::write_message(&mut server_w, &resp).await.unwrap();
        }
    }

    #[tokio::test]
    async fn round_trips_send_then_hashes() {
        let (client_w, server_r) = tokio::io::duplex(8192);
        let (server_w, client_r) = tokio::io::duplex(8192);
        tokio::spawn(fake_server(server_r, server_w));

        let mut rpc = RpcClient::new(client_r, client_w);
        rpc.send_text_file(TextFile {
            path: RelPath::new("a.txt").unwrap(),
            content: "hi".to_string(),
        })
        .await
        .unwrap();
        let hashes = rpc.get_file_hashes().await.unwrap();
        assert_eq!(hashes.len(), 1);
    }
}
