//! Tests for DbIterator
//!
//! These tests verify:
//! - Merged iteration across memtable and SSTables
//! - Iteration bounds and seek clamping
//! - Prefix-fenced iteration
//! - Snapshot and tailing iterators
//! - Cache-only iteration and checksum failures

use bytes::Bytes;
use stratakv::{
    Config, Engine, IterBound, IterStatus, PrefixExtractor, ReadOptions, ReadTier,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// =============================================================================
// Helper Functions
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open_engine(temp_dir: &TempDir, prefix: Option<PrefixExtractor>) -> Engine {
    init_tracing();
    let mut builder = Config::builder()
        .data_dir(temp_dir.path())
        .block_size(64);
    if let Some(extractor) = prefix {
        builder = builder.prefix_extractor(extractor);
    }
    Engine::open(builder.build()).unwrap()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&temp_dir, None);
    (temp_dir, engine)
}

fn reopen_cold(temp_dir: &TempDir, engine: Engine, prefix: Option<PrefixExtractor>) -> Engine {
    engine.close().unwrap();
    open_engine(temp_dir, prefix)
}

fn put_all(engine: &Engine, keys: &[&str]) {
    for key in keys {
        engine.put(key.as_bytes(), format!("v-{}", key).as_bytes()).unwrap();
    }
}

fn keys_of<I>(iter: I) -> Vec<String>
where
    I: Iterator<Item = stratakv::Result<(Bytes, Bytes)>>,
{
    iter.map(|item| {
        let (key, _) = item.unwrap();
        String::from_utf8(key.to_vec()).unwrap()
    })
    .collect()
}

fn scan(engine: &Engine, opts: &ReadOptions<'_>) -> Vec<String> {
    keys_of(engine.new_iterator(opts).unwrap())
}

// =============================================================================
// Basic Iteration Tests
// =============================================================================

#[test]
fn test_iterate_empty_engine() {
    let (_temp, engine) = setup_temp_engine();

    let mut iter = engine.new_iterator(&ReadOptions::new()).unwrap();
    assert!(iter.next().is_none());
    assert_eq!(iter.status(), IterStatus::Ok);
}

#[test]
fn test_iterate_merges_memtable_and_sstables() {
    let (_temp, engine) = setup_temp_engine();

    put_all(&engine, &["b", "d"]);
    engine.flush().unwrap();
    put_all(&engine, &["a", "e"]);
    engine.flush().unwrap();
    put_all(&engine, &["c"]);

    assert_eq!(scan(&engine, &ReadOptions::new()), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_iterate_returns_newest_value() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"k", b"old").unwrap();
    engine.flush().unwrap();
    engine.put(b"k", b"new").unwrap();

    let entries: Vec<_> = engine
        .new_iterator(&ReadOptions::new())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(
        entries,
        vec![(Bytes::from_static(b"k"), Bytes::from_static(b"new"))]
    );
}

#[test]
fn test_iterate_skips_deleted_keys() {
    let (_temp, engine) = setup_temp_engine();

    put_all(&engine, &["a", "b", "c"]);
    engine.flush().unwrap();
    engine.delete(b"b").unwrap();

    assert_eq!(scan(&engine, &ReadOptions::new()), vec!["a", "c"]);
}

#[test]
fn test_iterate_applies_range_deletions() {
    let (_temp, engine) = setup_temp_engine();

    put_all(&engine, &["a", "b", "c", "d"]);
    engine.delete_range(b"b", b"d").unwrap();
    engine.flush().unwrap();
    engine.put(b"c", b"again").unwrap();

    assert_eq!(scan(&engine, &ReadOptions::new()), vec!["a", "c", "d"]);

    let mut opts = ReadOptions::new();
    opts.set_ignore_range_deletions(true);
    assert_eq!(scan(&engine, &opts), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_iterate_many_keys_across_blocks() {
    let (temp, engine) = setup_temp_engine();

    for i in 0..200 {
        let key = format!("key{:04}", i);
        engine.put(key.as_bytes(), b"value").unwrap();
    }
    let engine = reopen_cold(&temp, engine, None);

    let keys = scan(&engine, &ReadOptions::new());
    assert_eq!(keys.len(), 200);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

// =============================================================================
// Bounds Tests
// =============================================================================

#[test]
fn test_bounds_are_half_open() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c", "d", "e"]);

    let lower = IterBound::new(b"b");
    let upper = IterBound::new(b"d");
    let mut opts = ReadOptions::new();
    opts.set_iterate_lower_bound(&lower);
    opts.set_iterate_upper_bound(&upper);

    assert_eq!(scan(&engine, &opts), vec!["b", "c"]);

    engine.flush().unwrap();
    assert_eq!(scan(&engine, &opts), vec!["b", "c"]);
}

#[test]
fn test_bounds_outlive_their_source_buffers() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c", "d", "e"]);

    let (lower, upper) = {
        let mut lower_src = b"b".to_vec();
        let mut upper_src = b"d".to_vec();
        let bounds = (IterBound::new(&lower_src), IterBound::new(&upper_src));
        lower_src[0] = b'z';
        upper_src.clear();
        bounds
    };

    let mut opts = ReadOptions::new();
    opts.set_iterate_lower_bound(&lower);
    opts.set_iterate_upper_bound(&upper);
    assert_eq!(scan(&engine, &opts), vec!["b", "c"]);
}

#[test]
fn test_lower_not_below_upper_is_empty() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c"]);
    engine.flush().unwrap();

    let lower = IterBound::new(b"c");
    let upper = IterBound::new(b"b");
    let mut opts = ReadOptions::new();
    opts.set_iterate_lower_bound(&lower);
    opts.set_iterate_upper_bound(&upper);

    let mut iter = engine.new_iterator(&opts).unwrap();
    assert!(iter.next().is_none());
    assert_eq!(iter.status(), IterStatus::Ok);
}

#[test]
fn test_seek_clamps_to_lower_bound() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c", "d"]);

    let lower = IterBound::new(b"c");
    let mut opts = ReadOptions::new();
    opts.set_iterate_lower_bound(&lower);

    let mut iter = engine.new_iterator(&opts).unwrap();
    iter.seek(b"a");
    assert_eq!(keys_of(&mut iter), vec!["c", "d"]);
}

#[test]
fn test_seek_repositions() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c", "d"]);
    engine.flush().unwrap();

    let mut iter = engine.new_iterator(&ReadOptions::new()).unwrap();
    assert_eq!(keys_of(&mut iter), vec!["a", "b", "c", "d"]);

    iter.seek(b"bb");
    assert_eq!(keys_of(&mut iter), vec!["c", "d"]);

    iter.seek_to_first();
    assert_eq!(keys_of(iter.by_ref().take(1)), vec!["a"]);
}

#[test]
fn test_upper_bound_limits_block_reads() {
    let (temp, engine) = setup_temp_engine();
    for i in 0..200 {
        let key = format!("key{:04}", i);
        engine.put(key.as_bytes(), b"value").unwrap();
    }
    let engine = reopen_cold(&temp, engine, None);

    let upper = IterBound::new(b"key0005");
    let mut opts = ReadOptions::new();
    opts.set_iterate_upper_bound(&upper);

    assert_eq!(scan(&engine, &opts).len(), 5);
    let reads = engine.stats().block_reads;
    assert!(reads > 0 && reads < 10, "read {} blocks", reads);
}

// =============================================================================
// Prefix Tests
// =============================================================================

fn setup_prefix_engine(extractor: PrefixExtractor) -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_engine(&temp_dir, Some(extractor));
    put_all(&engine, &["aa", "aaa1", "aaa2", "aab1", "abc"]);
    engine.flush().unwrap();
    put_all(&engine, &["aaa3"]);
    (temp_dir, engine)
}

fn prefix_opts<'a>() -> ReadOptions<'a> {
    let mut opts = ReadOptions::new();
    opts.set_prefix_same_as_start(true);
    opts
}

#[test]
fn test_prefix_from_seek_key() {
    let (_temp, engine) = setup_prefix_engine(PrefixExtractor::FixedLength(3));

    let mut iter = engine.new_iterator(&prefix_opts()).unwrap();
    iter.seek(b"aaa2");
    assert_eq!(keys_of(&mut iter), vec!["aaa2", "aaa3"]);

    iter.seek(b"aab");
    assert_eq!(keys_of(&mut iter), vec!["aab1"]);
}

#[test]
fn test_prefix_from_first_key_without_lower_bound() {
    let (_temp, engine) = setup_prefix_engine(PrefixExtractor::Capped(3));

    // "aa" is the first key; its capped prefix is "aa"
    assert_eq!(
        scan(&engine, &prefix_opts()),
        vec!["aa", "aaa1", "aaa2", "aaa3", "aab1"]
    );
}

#[test]
fn test_prefix_from_lower_bound() {
    let (_temp, engine) = setup_prefix_engine(PrefixExtractor::FixedLength(3));

    let lower = IterBound::new(b"aab");
    let mut opts = prefix_opts();
    opts.set_iterate_lower_bound(&lower);

    assert_eq!(scan(&engine, &opts), vec!["aab1"]);
}

#[test]
fn test_seek_key_outside_prefix_domain_is_unrestricted() {
    let (_temp, engine) = setup_prefix_engine(PrefixExtractor::FixedLength(3));

    let mut iter = engine.new_iterator(&prefix_opts()).unwrap();
    iter.seek(b"aa");
    assert_eq!(keys_of(&mut iter), vec!["aa", "aaa1", "aaa2", "aaa3", "aab1", "abc"]);
}

#[test]
fn test_prefix_and_upper_bound_both_apply() {
    let (_temp, engine) = setup_prefix_engine(PrefixExtractor::FixedLength(3));

    let upper = IterBound::new(b"aaa3");
    let mut opts = prefix_opts();
    opts.set_iterate_upper_bound(&upper);

    let mut iter = engine.new_iterator(&opts).unwrap();
    iter.seek(b"aaa");
    assert_eq!(keys_of(&mut iter), vec!["aaa1", "aaa2"]);
}

#[test]
fn test_prefix_flag_without_extractor_has_no_effect() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["aaa1", "aab1"]);

    let mut iter = engine.new_iterator(&prefix_opts()).unwrap();
    iter.seek(b"aaa");
    assert_eq!(keys_of(&mut iter), vec!["aaa1", "aab1"]);
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_snapshot_iteration() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b"]);
    let snapshot = engine.create_snapshot();

    engine.put(b"c", b"later").unwrap();
    engine.delete(b"a").unwrap();
    engine.flush().unwrap();

    let mut opts = ReadOptions::new();
    opts.set_snapshot(Some(snapshot));
    assert_eq!(scan(&engine, &opts), vec!["a", "b"]);
    assert_eq!(scan(&engine, &ReadOptions::new()), vec!["b", "c"]);

    engine.release_snapshot(snapshot);
}

#[test]
fn test_iterator_is_isolated_from_later_writes() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b"]);

    let mut iter = engine.new_iterator(&ReadOptions::new()).unwrap();
    engine.put(b"c", b"later").unwrap();
    engine.flush().unwrap();

    assert_eq!(keys_of(&mut iter), vec!["a", "b"]);
}

// =============================================================================
// Tailing Tests
// =============================================================================

fn tailing_opts<'a>() -> ReadOptions<'a> {
    let mut opts = ReadOptions::new();
    opts.set_tailing(true);
    opts
}

#[test]
fn test_tailing_iterator_sees_new_writes() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a"]);

    let mut iter = engine.new_iterator(&tailing_opts()).unwrap();
    assert_eq!(keys_of(&mut iter), vec!["a"]);

    put_all(&engine, &["b", "c"]);
    assert_eq!(keys_of(&mut iter), vec!["b", "c"]);
}

#[test]
fn test_tailing_iterator_continues_after_last_key() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["b", "d"]);

    let mut iter = engine.new_iterator(&tailing_opts()).unwrap();
    assert_eq!(keys_of(iter.by_ref().take(1)), vec!["b"]);

    // "a" sorts before the position; "c" after
    put_all(&engine, &["a", "c"]);
    engine.flush().unwrap();

    assert_eq!(keys_of(&mut iter), vec!["c", "d"]);
}

#[test]
fn test_tailing_iterator_respects_bounds() {
    let (_temp, engine) = setup_temp_engine();

    let upper = IterBound::new(b"m");
    let mut opts = tailing_opts();
    opts.set_iterate_upper_bound(&upper);

    let mut iter = engine.new_iterator(&opts).unwrap();
    assert!(iter.next().is_none());

    put_all(&engine, &["k", "z"]);
    assert_eq!(keys_of(&mut iter), vec!["k"]);
}

#[test]
fn test_tailing_iterator_sees_writes_ahead_during_long_scan() {
    let (_temp, engine) = setup_temp_engine();
    let keys: Vec<String> = (0..200).map(|i| format!("k{:03}", i * 2)).collect();
    for key in &keys {
        engine.put(key.as_bytes(), b"v").unwrap();
    }

    let mut iter = engine.new_iterator(&tailing_opts()).unwrap();
    let mut seen = keys_of(iter.by_ref().take(50));
    assert_eq!(seen.last().map(String::as_str), Some("k098"));

    // Odd keys: one behind the position, the rest ahead of it
    put_all(&engine, &["k001", "k101", "k251"]);
    seen.extend(keys_of(iter.by_ref().take(50)));
    put_all(&engine, &["k301"]);
    seen.extend(keys_of(&mut iter));

    assert!(!seen.contains(&"k001".to_string()));
    for key in ["k101", "k251", "k301"] {
        assert!(seen.contains(&key.to_string()), "missing {key}");
    }
    assert_eq!(seen.len(), 203);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_tailing_iterator_survives_flush_mid_scan() {
    let (_temp, engine) = setup_temp_engine();
    let keys: Vec<String> = (0..100).map(|i| format!("k{:03}", i)).collect();
    for key in &keys {
        engine.put(key.as_bytes(), b"v").unwrap();
    }

    let mut iter = engine.new_iterator(&tailing_opts()).unwrap();
    let mut seen = keys_of(iter.by_ref().take(40));

    // Memtable moves into an SSTable while the iterator is positioned in it
    engine.flush().unwrap();
    put_all(&engine, &["k0505"]);
    seen.extend(keys_of(&mut iter));

    let mut expected = keys.clone();
    expected.push("k0505".to_string());
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(iter.status(), IterStatus::Ok);
}

#[test]
fn test_tailing_iterator_applies_new_range_deletion() {
    let (_temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c", "d"]);

    let mut iter = engine.new_iterator(&tailing_opts()).unwrap();
    assert_eq!(keys_of(iter.by_ref().take(1)), vec!["a"]);

    engine.delete_range(b"b", b"d").unwrap();
    assert_eq!(keys_of(&mut iter), vec!["d"]);
}

#[test]
fn test_non_tailing_iterator_stays_exhausted() {
    let (_temp, engine) = setup_temp_engine();

    let mut iter = engine.new_iterator(&ReadOptions::new()).unwrap();
    assert!(iter.next().is_none());

    put_all(&engine, &["a"]);
    assert!(iter.next().is_none());
}

// =============================================================================
// Read Tier Tests
// =============================================================================

#[test]
fn test_cache_only_iterator_is_incomplete() {
    let (temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b"]);
    let engine = reopen_cold(&temp, engine, None);

    let mut opts = ReadOptions::new();
    opts.set_read_tier(ReadTier::CacheOnly);

    let mut iter = engine.new_iterator(&opts).unwrap();
    assert!(iter.next().is_none());
    assert!(iter.is_incomplete());
    assert_eq!(engine.stats().block_reads, 0);
}

#[test]
fn test_cache_only_iterator_after_warm_scan() {
    let (temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b"]);
    let engine = reopen_cold(&temp, engine, None);

    assert_eq!(scan(&engine, &ReadOptions::new()), vec!["a", "b"]);
    let reads = engine.stats().block_reads;

    let mut opts = ReadOptions::new();
    opts.set_read_tier(ReadTier::CacheOnly);
    let mut iter = engine.new_iterator(&opts).unwrap();
    assert_eq!(keys_of(&mut iter), vec!["a", "b"]);
    assert_eq!(iter.status(), IterStatus::Ok);
    assert_eq!(engine.stats().block_reads, reads);
}

#[test]
fn test_cache_only_iterator_skips_blocks_past_upper_bound() {
    let (temp, engine) = setup_temp_engine();
    put_all(&engine, &["x", "y"]);
    let engine = reopen_cold(&temp, engine, None);
    put_all(&engine, &["a"]);

    let upper = IterBound::new(b"m");
    let mut opts = ReadOptions::new();
    opts.set_read_tier(ReadTier::CacheOnly);
    opts.set_iterate_upper_bound(&upper);

    let mut iter = engine.new_iterator(&opts).unwrap();
    assert_eq!(keys_of(&mut iter), vec!["a"]);
    assert_eq!(iter.status(), IterStatus::Ok);
}

#[test]
fn test_fill_cache_false_scan_leaves_cache_cold() {
    let (temp, engine) = setup_temp_engine();
    put_all(&engine, &["a", "b", "c"]);
    let engine = reopen_cold(&temp, engine, None);

    let mut opts = ReadOptions::new();
    opts.set_fill_cache(false);
    assert_eq!(scan(&engine, &opts).len(), 3);
    assert_eq!(engine.stats().cache.len, 0);
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_iterator_reports_corruption_and_fails() {
    let (temp, engine) = setup_temp_engine();
    engine.put(b"key", b"precious-payload").unwrap();
    engine.flush().unwrap();

    let path = std::fs::read_dir(engine.storage_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|ext| ext == "sst"))
        .unwrap();
    let mut data = std::fs::read(&path).unwrap();
    let needle = b"precious-payload";
    let pos = data
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    data[pos] ^= 0xFF;
    std::fs::write(&path, data).unwrap();

    let engine = reopen_cold(&temp, engine, None);
    let mut opts = ReadOptions::new();
    opts.set_verify_checksums(true);

    let mut iter = engine.new_iterator(&opts).unwrap();
    let err = iter.next().unwrap().unwrap_err();
    assert!(err.is_corruption());
    assert!(iter.next().is_none());
    assert_eq!(iter.status(), IterStatus::Failed);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_iterators() {
    let (_temp, engine) = setup_temp_engine();
    for i in 0..100 {
        let key = format!("key{:03}", i);
        engine.put(key.as_bytes(), b"value").unwrap();
    }
    engine.flush().unwrap();

    crossbeam::scope(|s| {
        for t in 0..4 {
            let engine = &engine;
            s.spawn(move |_| {
                let lower = IterBound::new(format!("key{:03}", t * 25));
                let upper = IterBound::new(format!("key{:03}", t * 25 + 25));
                let mut opts = ReadOptions::new();
                opts.set_iterate_lower_bound(&lower);
                opts.set_iterate_upper_bound(&upper);
                assert_eq!(scan(engine, &opts).len(), 25);
            });
        }
        s.spawn(|_| {
            for i in 100..150 {
                let key = format!("key{:03}", i);
                engine.put(key.as_bytes(), b"value").unwrap();
            }
        });
    })
    .unwrap();
}
