//! MemTable Tests
//!
//! Tests verify:
//! - Versioned put/get with snapshot visibility
//! - Size tracking
//! - Point and range tombstones
//! - Bounded, sorted iteration
//! - Clear functionality
//! - Concurrent access patterns

use std::ops::Bound;

use bytes::Bytes;
use stratakv::key::ValueEntry;
use stratakv::memtable::MemTable;

fn value(v: &[u8]) -> ValueEntry {
    ValueEntry::Value(Bytes::copy_from_slice(v))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_and_get() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);

    assert_eq!(memtable.get(b"key1", 1), Some((1, value(b"value1"))));
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = MemTable::new();
    memtable.put(b"key1", b"value1", 1);

    assert_eq!(memtable.get(b"key0", 10), None);
    assert_eq!(memtable.get(b"key2", 10), None);
}

#[test]
fn test_versions_are_kept() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);
    memtable.put(b"key1", b"value2", 2);

    assert_eq!(memtable.entry_count(), 2);
    assert_eq!(memtable.get(b"key1", 2), Some((2, value(b"value2"))));
    assert_eq!(memtable.get(b"key1", 1), Some((1, value(b"value1"))));
}

#[test]
fn test_get_respects_snapshot_seqno() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 5);

    assert_eq!(memtable.get(b"key1", 4), None);
    assert_eq!(memtable.get(b"key1", 5), Some((5, value(b"value1"))));
    assert_eq!(memtable.get(b"key1", u64::MAX), Some((5, value(b"value1"))));
}

// =============================================================================
// Delete / Tombstone Tests
// =============================================================================

#[test]
fn test_delete_creates_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);
    memtable.delete(b"key1", 2);

    assert_eq!(memtable.get(b"key1", 2), Some((2, ValueEntry::Tombstone)));
    assert_eq!(memtable.get(b"key1", 1), Some((1, value(b"value1"))));
    assert_eq!(memtable.entry_count(), 2);
}

#[test]
fn test_put_after_delete() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);
    memtable.delete(b"key1", 2);
    memtable.put(b"key1", b"value2", 3);

    assert_eq!(memtable.get(b"key1", 3), Some((3, value(b"value2"))));
}

#[test]
fn test_delete_range_is_recorded() {
    let memtable = MemTable::new();

    memtable.delete_range(b"a", b"c", 4);

    assert_eq!(memtable.entry_count(), 0);
    assert!(!memtable.is_empty());
    let tombstones = memtable.range_tombstones();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].seqno, 4);
    assert!(tombstones[0].covers(b"b", 3, 4));
    assert!(!tombstones[0].covers(b"c", 3, 4));
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

const SEQNO_BYTES: usize = 8;

#[test]
fn test_size_tracking_put() {
    let memtable = MemTable::new();

    let new_size = memtable.put(b"key", b"value", 1);

    let expected_size = b"key".len() + b"value".len() + SEQNO_BYTES;
    assert_eq!(new_size, expected_size);
    assert_eq!(memtable.size(), expected_size);
}

#[test]
fn test_size_tracking_every_version_counts() {
    let memtable = MemTable::new();

    memtable.put(b"key", b"short", 1);
    memtable.put(b"key", b"much_longer_value", 2);

    let expected_size = (b"key".len() + b"short".len() + SEQNO_BYTES)
        + (b"key".len() + b"much_longer_value".len() + SEQNO_BYTES);
    assert_eq!(memtable.size(), expected_size);
}

#[test]
fn test_size_tracking_delete() {
    let memtable = MemTable::new();

    memtable.put(b"key", b"value", 1);
    let size_after_put = memtable.size();

    memtable.delete(b"key", 2);

    assert_eq!(memtable.size(), size_after_put + b"key".len() + SEQNO_BYTES);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_empty() {
    let memtable = MemTable::new();
    assert!(memtable.iter().is_empty());
}

#[test]
fn test_iter_sorted_order() {
    let memtable = MemTable::new();

    // Insert in random order
    memtable.put(b"cherry", b"3", 1);
    memtable.put(b"apple", b"1", 2);
    memtable.put(b"banana", b"2", 3);

    let entries = memtable.iter();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].user_key(), b"apple");
    assert_eq!(entries[1].user_key(), b"banana");
    assert_eq!(entries[2].user_key(), b"cherry");
}

#[test]
fn test_iter_newest_version_first() {
    let memtable = MemTable::new();

    memtable.put(b"key", b"old", 1);
    memtable.put(b"key", b"new", 7);

    let entries = memtable.iter();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seqno(), 7);
    assert_eq!(entries[1].seqno(), 1);
}

#[test]
fn test_iter_includes_tombstones() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);
    memtable.delete(b"key2", 2);
    memtable.put(b"key3", b"value3", 3);

    let entries = memtable.iter();

    assert_eq!(entries.len(), 3);
    assert!(!entries[0].value.is_tombstone());
    assert!(entries[1].value.is_tombstone());
    assert!(!entries[2].value.is_tombstone());
}

#[test]
fn test_range_is_half_open() {
    let memtable = MemTable::new();
    for (i, key) in [b"a", b"b", b"c", b"d", b"e"].iter().enumerate() {
        memtable.put(*key, b"v", i as u64 + 1);
    }

    let keys: Vec<_> = memtable
        .range(Some(&b"b"[..]), Some(&b"d"[..]))
        .into_iter()
        .map(|e| e.key.user_key)
        .collect();
    assert_eq!(keys, vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
}

#[test]
fn test_range_includes_all_versions_of_lower_key() {
    let memtable = MemTable::new();
    memtable.put(b"b", b"old", 1);
    memtable.put(b"b", b"new", 2);

    assert_eq!(memtable.range(Some(&b"b"[..]), None).len(), 2);
}

#[test]
fn test_range_empty_when_lower_not_below_upper() {
    let memtable = MemTable::new();
    memtable.put(b"b", b"v", 1);

    assert!(memtable.range(Some(&b"c"[..]), Some(&b"a"[..])).is_empty());
    assert!(memtable.range(Some(&b"b"[..]), Some(&b"b"[..])).is_empty());
}

#[test]
fn test_iter_clones_data() {
    let memtable = MemTable::new();

    memtable.put(b"key", b"value", 1);
    let entries = memtable.iter();

    memtable.put(b"key", b"modified", 2);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, value(b"value"));
}

#[test]
fn test_scan_batch_ends_on_key_boundary() {
    let memtable = MemTable::new();

    memtable.put(b"a", b"a1", 1);
    memtable.put(b"b", b"b1", 2);
    memtable.put(b"b", b"b2", 3);
    memtable.put(b"b", b"b3", 4);
    memtable.put(b"c", b"c1", 5);

    // Two versions requested, but all of "b" comes along
    let (_, batch) = memtable.scan_batch(Bound::Unbounded, None, 2);
    let keys: Vec<(&[u8], u64)> = batch.iter().map(|e| (e.user_key(), e.seqno())).collect();
    assert_eq!(
        keys,
        vec![(&b"a"[..], 1), (&b"b"[..], 4), (&b"b"[..], 3), (&b"b"[..], 2)]
    );

    // Resume just past "b"
    let (_, rest) = memtable.scan_batch(Bound::Excluded(&b"b"[..]), None, 2);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].user_key(), b"c");
}

#[test]
fn test_scan_batch_respects_upper_bound() {
    let memtable = MemTable::new();

    memtable.put(b"a", b"1", 1);
    memtable.put(b"m", b"2", 2);

    let (_, batch) = memtable.scan_batch(Bound::Included(&b"a"[..]), Some(&b"m"[..]), 10);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].user_key(), b"a");

    let (_, past) = memtable.scan_batch(Bound::Included(&b"m"[..]), Some(&b"m"[..]), 10);
    assert!(past.is_empty());
    let (_, past) = memtable.scan_batch(Bound::Excluded(&b"z"[..]), Some(&b"m"[..]), 10);
    assert!(past.is_empty());
}

#[test]
fn test_epoch_changes_on_clear_and_range_delete_only() {
    let memtable = MemTable::new();
    let start = memtable.epoch();

    memtable.put(b"k", b"v", 1);
    memtable.delete(b"k", 2);
    assert_eq!(memtable.epoch(), start);

    memtable.delete_range(b"a", b"z", 3);
    let after_range_delete = memtable.epoch();
    assert_ne!(after_range_delete, start);

    memtable.clear();
    assert_ne!(memtable.epoch(), after_range_delete);

    let (epoch, batch) = memtable.scan_batch(Bound::Unbounded, None, 8);
    assert_eq!(epoch, memtable.epoch());
    assert!(batch.is_empty());
}

// =============================================================================
// Clear Tests
// =============================================================================

#[test]
fn test_clear() {
    let memtable = MemTable::new();

    memtable.put(b"key1", b"value1", 1);
    memtable.put(b"key2", b"value2", 2);
    memtable.delete_range(b"a", b"z", 3);
    assert_eq!(memtable.entry_count(), 2);
    assert!(memtable.size() > 0);

    memtable.clear();

    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
    assert!(memtable.range_tombstones().is_empty());
    assert_eq!(memtable.get(b"key1", u64::MAX), None);
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_empty_key() {
    let memtable = MemTable::new();

    memtable.put(&[], b"value", 1);

    assert_eq!(memtable.get(&[], 1), Some((1, value(b"value"))));
}

#[test]
fn test_empty_value() {
    let memtable = MemTable::new();

    memtable.put(b"key", &[], 1);

    assert_eq!(memtable.get(b"key", 1), Some((1, value(&[]))));
}

#[test]
fn test_large_value() {
    let memtable = MemTable::new();

    let large_value = vec![0xAB; 1024 * 1024]; // 1 MB
    memtable.put(b"big_key", &large_value, 1);

    match memtable.get(b"big_key", 1) {
        Some((_, ValueEntry::Value(v))) => assert_eq!(v.as_ref(), large_value.as_slice()),
        other => panic!("Expected Value, got {:?}", other),
    }
}

#[test]
fn test_many_entries() {
    let memtable = MemTable::new();

    for i in 0..1000u64 {
        let key = format!("key{:04}", i);
        let value = format!("value{}", i);
        memtable.put(key.as_bytes(), value.as_bytes(), i + 1);
    }

    assert_eq!(memtable.entry_count(), 1000);

    let entries = memtable.iter();
    for pair in entries.windows(2) {
        assert!(pair[0].user_key() < pair[1].user_key());
    }
}

// =============================================================================
// Concurrent Access Tests (Basic)
// =============================================================================

#[test]
fn test_concurrent_reads() {
    use std::sync::Arc;
    use std::thread;

    let memtable = Arc::new(MemTable::new());
    memtable.put(b"key", b"value", 1);

    let mut handles = vec![];

    for _ in 0..10 {
        let mt = Arc::clone(&memtable);
        let handle = thread::spawn(move || {
            for _ in 0..100 {
                assert_eq!(mt.get(b"key", 1), Some((1, value(b"value"))));
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_writes() {
    use std::sync::Arc;
    use std::thread;

    let memtable = Arc::new(MemTable::new());

    let mut handles = vec![];

    for i in 0..10u64 {
        let mt = Arc::clone(&memtable);
        let handle = thread::spawn(move || {
            for j in 0..10u64 {
                let key = format!("key{}_{}", i, j);
                let value = format!("value{}_{}", i, j);
                mt.put(key.as_bytes(), value.as_bytes(), i * 10 + j + 1);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 100);
}
