//! Transfer unit planning
//!
//! Splits an object into contiguous, non-overlapping byte ranges. Chunks are
//! computed once per job and then handed out by index, so coverage does not
//! depend on which worker picks up which chunk.

use std::ops::Range;

use crate::error::{Error, Result};

/// One mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Minimum size of every part but the last in a multipart upload
pub const MIN_PART_SIZE: u64 = 5 * MIB;

/// Maximum number of parts in a multipart upload
pub const MAX_PARTS: usize = 10_000;

/// A contiguous byte range of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
}

impl Chunk {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// 1-based part number used by multipart uploads
    pub fn part_number(&self) -> i32 {
        self.index as i32 + 1
    }

    /// HTTP `Range` header value covering this chunk
    pub fn http_range(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end().saturating_sub(1))
    }
}

/// Number of chunks needed to cover `size_bytes`
pub fn chunk_count(size_bytes: u64, chunk_size_bytes: u64) -> u64 {
    size_bytes.div_ceil(chunk_size_bytes)
}

/// Partition `[0, size_bytes)` into chunks of `chunk_size_bytes`; the last may be shorter.
pub fn plan(size_bytes: u64, chunk_size_bytes: u64) -> Result<Vec<Chunk>> {
    if chunk_size_bytes == 0 {
        return Err(Error::InvalidConfig(
            "chunk size must be greater than zero".into(),
        ));
    }

    let count = chunk_count(size_bytes, chunk_size_bytes) as usize;
    let chunks = (0..count)
        .map(|index| {
            let offset = index as u64 * chunk_size_bytes;
            Chunk {
                index,
                offset,
                length: chunk_size_bytes.min(size_bytes - offset),
            }
        })
        .collect();

    Ok(chunks)
}

/// The single range a serial transfer covers
pub fn whole(size_bytes: u64) -> Chunk {
    Chunk {
        index: 0,
        offset: 0,
        length: size_bytes,
    }
}

/// Reject plans a multipart upload would refuse
pub fn check_multipart_limits(size_bytes: u64, chunk_size_bytes: u64) -> Result<()> {
    let count = chunk_count(size_bytes, chunk_size_bytes);
    if count > MAX_PARTS as u64 {
        return Err(Error::InvalidConfig(format!(
            "{count} chunks exceeds the multipart limit of {MAX_PARTS}; use a larger chunk size"
        )));
    }
    if count > 1 && chunk_size_bytes < MIN_PART_SIZE {
        return Err(Error::InvalidConfig(format!(
            "chunk size {chunk_size_bytes} is below the multipart minimum of {MIN_PART_SIZE} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_uneven_tail() {
        let chunks = plan(100, 30).unwrap();
        let ranges: Vec<_> = chunks.iter().map(Chunk::range).collect();
        assert_eq!(ranges, vec![0..30, 30..60, 60..90, 90..100]);
        assert_eq!(chunks[3].index, 3);
    }

    #[test]
    fn test_plan_covers_object_exactly() {
        for size in [0u64, 1, 29, 30, 31, 99, 100, 101, 1000, 4096] {
            for chunk_size in [1u64, 7, 30, 100, 5000] {
                let chunks = plan(size, chunk_size).unwrap();
                assert_eq!(chunks.len() as u64, size.div_ceil(chunk_size));

                let mut next = 0;
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, i);
                    assert_eq!(chunk.offset, next, "gap or overlap at chunk {i}");
                    assert!(chunk.length > 0 && chunk.length <= chunk_size);
                    next = chunk.end();
                }
                assert_eq!(next, size);
            }
        }
    }

    #[test]
    fn test_plan_empty_object() {
        assert!(plan(0, 25 * MIB).unwrap().is_empty());
    }

    #[test]
    fn test_plan_zero_chunk_size() {
        assert!(matches!(plan(100, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_whole_matches_single_chunk() {
        let single = plan(100, 100).unwrap();
        assert_eq!(single, vec![whole(100)]);
    }

    #[test]
    fn test_part_number_and_range_header() {
        let chunk = plan(100, 30).unwrap()[1];
        assert_eq!(chunk.part_number(), 2);
        assert_eq!(chunk.http_range(), "bytes=30-59");
    }

    #[test]
    fn test_multipart_limits() {
        assert!(check_multipart_limits(100 * MIB, 25 * MIB).is_ok());
        // A single small part is fine
        assert!(check_multipart_limits(MIB, MIB).is_ok());
        assert!(matches!(
            check_multipart_limits(10 * MIB, MIB),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            check_multipart_limits(MAX_PARTS as u64 * MIN_PART_SIZE + 1, MIN_PART_SIZE),
            Err(Error::InvalidConfig(_))
        ));
    }
}
