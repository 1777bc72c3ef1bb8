pub mod cache;
pub mod checksum;
pub mod delta;
pub mod error;
pub mod fs_io;
pub mod framing;
pub mod ignore;
pub mod path;
pub mod protocol;
pub mod walk;

pub use cache::TextCache;
pub use checksum::ChecksumIndex;
pub use delta::Delta;
pub use error::{TextSyncError, WireError};
pub use ignore::IgnorePolicy;
pub use path::RelPath;
pub use protocol::{Request, Response, TextFile};
