//! Ledger records: one sealed product revision each.

use crate::digest::{meets_difficulty, FieldHasher};
use crate::error::MiningError;
use crate::miner::{Miner, Seal};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Caller-supplied fields of a new product revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revision {
    pub product_code: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub price: f64,
}

impl Revision {
    pub fn new(
        product_code: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            title: title.into(),
            category: category.into(),
            description: description.into(),
            price,
        }
    }
}

/// A product revision stored in the ledger.
///
/// Everything except `hash` and `nonce` is fixed at construction. Sealing
/// replaces those two fields and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Hex digest of the record's fields and nonce
    pub hash: String,
    /// Hash of the record immediately before this one; `None` for the first record
    pub previous_hash: Option<String>,
    /// Position in the ledger
    pub index: u64,
    pub product_code: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    /// Index of the latest earlier revision of the same product
    pub previous_revision_index: Option<u64>,
    /// Creation time, Unix milliseconds
    pub timestamp: i64,
    pub nonce: u64,
}

impl Record {
    /// Build an unsealed record stamped with the current time. Its provisional
    /// hash is computed with nonce `0`.
    pub fn new(
        previous_hash: Option<String>,
        index: u64,
        revision: Revision,
        previous_revision_index: Option<u64>,
    ) -> Self {
        let mut record = Self {
            hash: String::new(),
            previous_hash,
            index,
            product_code: revision.product_code,
            title: revision.title,
            category: revision.category,
            description: revision.description,
            price: revision.price,
            previous_revision_index,
            timestamp: Utc::now().timestamp_millis(),
            nonce: 0,
        };
        record.hash = record.compute_hash(0);
        record
    }

    /// Digest of this record's fields combined with `nonce`.
    pub fn compute_hash(&self, nonce: u64) -> String {
        let mut hasher = FieldHasher::new();
        hasher
            .optional_text(self.previous_hash.as_deref())
            .i64(self.timestamp)
            .u64(nonce)
            .u64(self.index)
            .text(&self.product_code)
            .text(&self.title)
            .f64(self.price)
            .text(&self.category)
            .text(&self.description)
            .optional_u64(self.previous_revision_index);
        hasher.finish()
    }

    /// Whether the stored hash still matches the stored fields and nonce.
    pub fn hash_is_intact(&self) -> bool {
        self.hash == self.compute_hash(self.nonce)
    }

    pub fn is_sealed(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Mine this record with `miner`, replacing its hash and nonce with the
    /// winning pair.
    pub fn seal(&mut self, miner: &Miner) -> Result<&str, MiningError> {
        let Seal { hash, nonce } = miner.mine(self)?;
        self.hash = hash;
        self.nonce = nonce;
        Ok(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(None, 0, Revision::new("A", "T", "C", "D", 10.5), None)
    }

    #[test]
    fn test_new_record_has_provisional_hash() {
        let record = sample();
        assert_eq!(record.nonce, 0);
        assert_eq!(record.hash, record.compute_hash(0));
        assert!(record.hash_is_intact());
    }

    #[test]
    fn test_hash_covers_every_field() {
        let record = sample();
        let base = record.compute_hash(0);

        let mut changed = record.clone();
        changed.title.push('!');
        assert_ne!(changed.compute_hash(0), base);

        let mut changed = record.clone();
        changed.price = 11.0;
        assert_ne!(changed.compute_hash(0), base);

        let mut changed = record.clone();
        changed.previous_revision_index = Some(0);
        assert_ne!(changed.compute_hash(0), base);

        assert_ne!(record.compute_hash(1), base);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("productCode").is_some());
        assert!(json.get("previousRevisionIndex").unwrap().is_null());
        assert!(json.get("previousHash").unwrap().is_null());
    }
}
