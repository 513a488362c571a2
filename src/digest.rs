//! SHA-256 digests over a canonical field encoding, and the difficulty check.

use sha2::{Digest, Sha256};

/// Incrementally feeds typed fields into a SHA-256 hasher.
///
/// Text is length-prefixed and optional values carry a presence tag, so two
/// different field sequences can never produce the same byte stream.
#[derive(Clone, Default)]
pub struct FieldHasher {
    hasher: Sha256,
}

impl FieldHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.hasher.update((value.len() as u64).to_be_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn optional_text(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.hasher.update([1u8]);
                self.text(v)
            }
            None => {
                self.hasher.update([0u8]);
                self
            }
        }
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn optional_u64(&mut self, value: Option<u64>) -> &mut Self {
        match value {
            Some(v) => {
                self.hasher.update([1u8]);
                self.u64(v)
            }
            None => {
                self.hasher.update([0u8]);
                self
            }
        }
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.hasher.update(value.to_bits().to_be_bytes());
        self
    }

    /// Consume the hasher and return the lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Whether `hash` starts with `difficulty` `'0'` hex characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
