use std::collections::HashMap;

use crc::{Crc, CRC_64_GO_ISO};

use crate::path::RelPath;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// `path -> CRC-64` snapshot of a [`crate::cache::TextCache`], computed on
/// demand and never persisted.
pub type ChecksumIndex = HashMap<RelPath, u64>;

/// CRC-64 (ISO polynomial) over the UTF-8 bytes of `content`.
pub fn checksum(content: &str) -> u64 {
    CRC64.checksum(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_order_independent_of_allocation() {
        let a = checksum("same content");
        let b = checksum(&String::from("same content"));
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_changed_content() {
        assert_ne!(checksum("a"), checksum("b"));
    }
}
