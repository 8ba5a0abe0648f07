use ferry_types::ContentDigest;
use md5::{Digest, Md5};

/// Incremental whole-object MD5 hasher.
///
/// Chunks must be fed in read order. The resulting digest is independent of
/// how the content was split into chunks.
#[derive(Clone, Default)]
pub struct DigestAccumulator {
    hasher: Md5,
    bytes_seen: u64,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes_seen += chunk.len() as u64;
    }

    /// Total bytes fed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest::md5(self.hasher.finalize().into())
    }
}

impl std::fmt::Debug for DigestAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestAccumulator")
            .field("bytes_seen", &self.bytes_seen)
            .finish()
    }
}

/// One-shot MD5 of a byte slice.
pub fn md5_of(data: &[u8]) -> ContentDigest {
    let mut acc = DigestAccumulator::new();
    acc.update(data);
    acc.finalize()
}
