//! End-to-end ledger behaviour through the public API and the JSON store.

use product_ledger::{
    JsonFileStore, Ledger, LedgerConfig, NonceStrategy, Revision, SearchQuery, Violation,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const DIFFICULTY: usize = 2;

fn config(workers: usize) -> LedgerConfig {
    LedgerConfig::with_workers(workers).difficulty(DIFFICULTY)
}

fn open(path: &Path, workers: usize) -> Ledger {
    Ledger::open(config(workers), JsonFileStore::new(path)).unwrap()
}

fn store_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("BlockChainDB.json")
}

fn revision(code: &str, price: f64) -> Revision {
    Revision::new(code, format!("{code} title"), "hardware", format!("{code} description"), price)
}

/// Rewrite one field of one stored record, leaving everything else as saved.
fn tamper(path: &Path, index: usize, field: &str, value: Value) {
    let mut doc: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    doc[index][field] = value;
    fs::write(path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
}

#[test]
fn example_two_revisions_of_one_product() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = open(&store_path(&dir), 4);

    let first = ledger
        .append(Revision::new("A", "T", "C", "D", 10.5))
        .unwrap()
        .clone();
    assert_eq!(first.index, 0);
    assert!(first.previous_hash.is_none());
    assert!(first.previous_revision_index.is_none());
    assert!(first.hash.starts_with("00"));

    let second = ledger
        .append(Revision::new("A", "T", "C", "D", 12.0))
        .unwrap();
    assert_eq!(second.index, 1);
    assert_eq!(second.previous_revision_index, Some(0));
    assert_eq!(second.previous_hash.as_ref(), Some(&first.hash));

    let stats = ledger.statistics("A").unwrap().unwrap();
    assert_eq!(stats.revisions, 2);
    assert_eq!(stats.max_price, 12.0);
    assert_eq!(stats.min_price, 10.5);
    assert_eq!(stats.median_price, (10.5 + 12.0) / 2.0);
}

#[test]
fn sealed_records_recompute_and_link() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = Ledger::open(
        config(3).strategy(NonceStrategy::Jump),
        JsonFileStore::new(store_path(&dir)),
    )
    .unwrap();
    for (i, code) in ["A", "B", "A", "C", "B", "A"].iter().enumerate() {
        ledger.append(revision(code, i as f64)).unwrap();
    }

    let records = ledger.records();
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.index, i as u64);
        assert!(record.hash.starts_with(&"0".repeat(DIFFICULTY)));
        assert_eq!(record.hash, record.compute_hash(record.nonce));
        match i {
            0 => assert!(record.previous_hash.is_none()),
            _ => assert_eq!(record.previous_hash.as_ref(), Some(&records[i - 1].hash)),
        }
        if let Some(target) = record.previous_revision_index {
            let previous = &records[target as usize];
            assert!(target < record.index);
            assert_eq!(previous.product_code, record.product_code);
        }
    }
    assert!(ledger.validate().is_valid());
}

#[test]
fn ledger_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let mut ledger = open(&path, 2);
        ledger.append(revision("A", 1.0)).unwrap();
        ledger.append(revision("B", 2.0)).unwrap();
    }

    let mut reopened = open(&path, 5);
    assert_eq!(reopened.len(), 2);
    assert!(reopened.validate().is_valid());

    let third = reopened.append(revision("A", 3.0)).unwrap();
    assert_eq!(third.previous_revision_index, Some(0));
    assert_eq!(open(&path, 1).len(), 3);
}

#[test]
fn unreadable_store_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    fs::write(&path, "not json at all").unwrap();

    let ledger = open(&path, 2);
    assert!(ledger.is_empty());
}

#[test]
fn tampering_a_stored_field_fails_validation_for_that_record_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let mut ledger = open(&path, 3);
        for code in ["A", "B", "C", "D"] {
            ledger.append(revision(code, 5.0)).unwrap();
        }
    }

    tamper(&path, 2, "price", Value::from(99.0));
    let validation = open(&path, 3).validate();
    assert!(!validation.is_valid());
    assert_eq!(validation.violations, vec![Violation::HashMismatch { index: 2 }]);
}

#[test]
fn tampering_a_stored_previous_hash_breaks_the_link() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let mut ledger = open(&path, 2);
        for code in ["A", "B", "C"] {
            ledger.append(revision(code, 1.0)).unwrap();
        }
    }

    tamper(&path, 1, "previousHash", Value::from("00abc"));
    let validation = open(&path, 2).validate();
    assert!(!validation.is_valid());
    assert!(validation.violations.contains(&Violation::BrokenLink { index: 1 }));
    assert!(validation
        .violations
        .iter()
        .all(|v| matches!(v, Violation::BrokenLink { index: 1 } | Violation::HashMismatch { index: 1 })));
}

#[test]
fn empty_search_returns_every_product_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = open(&store_path(&dir), 3);
    for code in ["A", "B", "A", "C", "B", "D", "A"] {
        ledger.append(revision(code, 1.0)).unwrap();
    }

    for retrieve_latest in [true, false] {
        let found = ledger
            .search(&SearchQuery {
                retrieve_latest,
                ..Default::default()
            })
            .unwrap();
        let codes: BTreeSet<&str> = found.iter().map(|r| r.product_code.as_str()).collect();
        assert_eq!(codes, BTreeSet::from(["A", "B", "C", "D"]));
    }
}

#[test]
fn validation_agrees_across_worker_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);
    {
        let mut ledger = open(&path, 2);
        for code in ["A", "B", "C"] {
            ledger.append(revision(code, 1.0)).unwrap();
        }
    }
    tamper(&path, 0, "title", Value::from("forged"));

    for workers in [1, 2, 3, 8] {
        let validation = open(&path, workers).validate();
        assert!(!validation.is_valid());
        assert_eq!(validation.violations, vec![Violation::HashMismatch { index: 0 }]);
    }
}
