use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumIndex;
use crate::delta::Delta;
use crate::error::WireError;
use crate::path::RelPath;

/// A path and the full text content read from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFile {
    pub path: RelPath,
    pub content: String,
}

/// Every call is client-initiated; the server never pushes. At most one
/// request is outstanding per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    GetTextFile(RelPath),
    GetTextFiles(Vec<RelPath>),
    SendTextFile(TextFile),
    SendTextFiles(Vec<TextFile>),
    GetFileHashes,
    ApplyDeltas(Vec<(RelPath, Delta)>),
    /// Mirrors `SendTextFiles`; resolves the open question on deletion.
    DeleteFiles(Vec<RelPath>),
}

/// Every response is either a full success or a structured error; there is
/// no partial-success payload. For batch verbs the structured error itself
/// names which paths failed (see `WireError`); healthy paths in the same
/// batch are still applied server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ok,
    TextFile(String),
    TextFiles(Vec<TextFile>),
    Hashes(ChecksumIndex),
    Err(WireError),
}

pub fn encode(msg: &impl Serialize) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

pub fn decode<T: for<'de> Deserialize<'de>>(buf: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_bincode() {
        let req = Request::GetTextFiles(vec![RelPath::new("a.txt").unwrap()]);
        let bytes = encode(&req).unwrap();
        let back: Request = decode(&bytes).unwrap();
        assert!(matches!(back, Request::GetTextFiles(_)));
    }
}
