use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the core synchronization engine.
///
/// Kinds mirror the error model: a local filesystem failure, a missing
/// server-side path, a delta that could not be applied, a reconciler
/// mismatch, a closed transport, and a wire decoding failure.
#[derive(Debug, Error)]
pub enum TextSyncError {
    #[error("io error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Aggregate of per-path I/O failures from a batch verb.
    #[error("io errors: {0:?}")]
    BatchIo(Vec<(String, String)>),

    #[error("not found: {0}")]
    NotFound(String),

    /// Paths whose delta could not be applied cleanly against the cached base.
    #[error("delta mismatch for {0:?}")]
    DeltaMismatch(Vec<String>),

    /// Paths where client and server content diverge; requires human intervention.
    #[error("content divergence: {0:?}")]
    ContentDivergence(Vec<String>),

    #[error("transport closed")]
    TransportClosed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TextSyncError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        TextSyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Serializable projection of [`TextSyncError`] for transport over the wire.
///
/// `std::io::Error` does not implement `Serialize`, so every error that
/// crosses the protocol boundary is flattened into plain strings here and
/// reconstituted by the receiving peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireError {
    Io(Vec<(String, String)>),
    NotFound(String),
    DeltaMismatch(Vec<String>),
    ContentDivergence(Vec<String>),
    Protocol(String),
}

impl From<&TextSyncError> for WireError {
    fn from(e: &TextSyncError) -> Self {
        match e {
            TextSyncError::Io { path, source } => WireError::Io(vec![(path.clone(), source.to_string())]),
            TextSyncError::BatchIo(v) => WireError::Io(v.clone()),
            TextSyncError::NotFound(p) => WireError::NotFound(p.clone()),
            TextSyncError::DeltaMismatch(v) => WireError::DeltaMismatch(v.clone()),
            TextSyncError::ContentDivergence(v) => WireError::ContentDivergence(v.clone()),
            TextSyncError::TransportClosed => WireError::Protocol("transport closed".into()),
            TextSyncError::Protocol(s) => WireError::Protocol(s.clone()),
        }
    }
}

impl From<WireError> for TextSyncError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(v) => TextSyncError::BatchIo(v),
            WireError::NotFound(p) => TextSyncError::NotFound(p),
            WireError::DeltaMismatch(v) => TextSyncError::DeltaMismatch(v),
            WireError::ContentDivergence(v) => TextSyncError::ContentDivergence(v),
            WireError::Protocol(s) => TextSyncError::Protocol(s),
        }
    }
}
