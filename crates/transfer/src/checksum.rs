//! SHA-256 tree hash
//!
//! The integrity checksum sent when a multi-part upload completes, and with
//! each part. The input is split into 1 MiB chunks, each chunk is hashed, and
//! adjacent digests are hashed pairwise level by level until one remains. An
//! odd digest at the end of a level is carried up unchanged.

use frostline_core::ArchiveBlob;
use sha2::{Digest, Sha256};
use std::io;

/// Leaf chunk size
pub const TREE_HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Incremental tree hash builder
#[derive(Debug, Default)]
pub struct TreeHasher {
    leaves: Vec<[u8; 32]>,
    pending: Vec<u8>,
}

impl TreeHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more input
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = TREE_HASH_CHUNK_SIZE - self.pending.len();
            let take = room.min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == TREE_HASH_CHUNK_SIZE {
                self.leaves.push(Sha256::digest(&self.pending).into());
                self.pending.clear();
            }
        }
    }

    /// Finish and return the lowercase hex digest
    pub fn finish(mut self) -> String {
        if !self.pending.is_empty() || self.leaves.is_empty() {
            self.leaves.push(Sha256::digest(&self.pending).into());
        }

        let mut level = self.leaves;
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => {
                        let mut hasher = Sha256::new();
                        hasher.update(left);
                        hasher.update(right);
                        hasher.finalize().into()
                    }
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
        }

        hex_encode(&level[0])
    }
}

/// Tree hash of an in-memory buffer
pub fn tree_hash(data: &[u8]) -> String {
    let mut hasher = TreeHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// Tree hash of a whole archive blob, read one chunk at a time
pub fn tree_hash_blob(blob: &dyn ArchiveBlob) -> io::Result<String> {
    let mut hasher = TreeHasher::new();
    let size = blob.size();
    let mut offset = 0;
    while offset < size {
        let length = (size - offset).min(TREE_HASH_CHUNK_SIZE as u64);
        hasher.update(&blob.read_range(offset, length)?);
        offset += length;
    }
    Ok(hasher.finish())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
