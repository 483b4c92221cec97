use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use triage_ai::corpus::demo::demo_snapshot;
use triage_ai::corpus::{CorpusHandle, CorpusManifest, CorpusSnapshot, CorpusStore, DocumentChunk};
use triage_core::error::codes;

#[test]
fn write_then_load_preserves_manifest_and_chunks() {
    let dir = tempdir().expect("tempdir");
    let store = CorpusStore::open(dir.path().join("corpus"));
    assert!(store.status().expect("status").is_none());

    let snap = demo_snapshot(64).expect("demo");
    store.write(&snap).expect("write");

    let loaded = store.load().expect("load");
    assert_eq!(loaded.manifest(), snap.manifest());
    assert_eq!(loaded.len(), snap.len());
    assert_eq!(loaded.chunks()[0].as_ref(), snap.chunks()[0].as_ref());
    assert!(!dir.path().join("corpus").join("manifest.tmp").exists());
}

#[test]
fn tampered_chunks_are_rejected_as_version_mismatch() {
    let dir = tempdir().expect("tempdir");
    let store = CorpusStore::open(dir.path().to_path_buf());
    store.write(&demo_snapshot(64).expect("demo")).expect("write");

    let chunks_path = dir.path().join("chunks.json");
    let raw = fs::read_to_string(&chunks_path).expect("read");
    fs::write(&chunks_path, raw.replacen("Malaria", "Dengue", 1)).expect("tamper");

    let err = store.load().unwrap_err();
    assert_eq!(err.code, codes::CORPUS_VERSION_MISMATCH);
}

#[test]
fn manifest_inconsistencies_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = CorpusStore::open(dir.path().to_path_buf());
    store.write(&demo_snapshot(64).expect("demo")).expect("write");

    let manifest_path = dir.path().join("manifest.json");
    let original: CorpusManifest =
        serde_json::from_str(&fs::read_to_string(&manifest_path).expect("read")).expect("decode");

    for broken in [
        CorpusManifest {
            dims: 32,
            ..original.clone()
        },
        CorpusManifest {
            chunk_count: original.chunk_count + 1,
            ..original.clone()
        },
        CorpusManifest {
            built_at: "yesterday".to_string(),
            ..original.clone()
        },
    ] {
        fs::write(&manifest_path, serde_json::to_string(&broken).expect("encode")).expect("write");
        let err = store.load().unwrap_err();
        assert_eq!(err.code, codes::CORPUS_VERSION_MISMATCH);
    }
}

#[test]
fn non_finite_embeddings_are_rejected() {
    let snap = demo_snapshot(64).expect("demo");
    for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let mut chunks: Vec<DocumentChunk> = snap.chunks().iter().map(|c| c.as_ref().clone()).collect();
        chunks[1].embedding[7] = bad;
        let err = CorpusSnapshot::new(snap.manifest().clone(), chunks).unwrap_err();
        assert_eq!(err.code, codes::CORPUS_VERSION_MISMATCH, "{bad}");
        assert_eq!(err.message, "Chunk embedding contains non-finite values");
    }
}

#[test]
fn missing_corpus_is_a_store_failure() {
    let dir = tempdir().expect("tempdir");
    let err = CorpusStore::open(dir.path().join("absent")).load().unwrap_err();
    assert_eq!(err.code, codes::CORPUS_STORE_FAILED);
}

#[test]
fn publish_swaps_atomically_and_keeps_in_flight_snapshots() {
    let handle = CorpusHandle::empty();
    assert!(handle.snapshot().is_none());

    assert_eq!(handle.publish(demo_snapshot(64).expect("demo")), None);
    let in_flight = handle.snapshot().expect("snapshot");
    let first_version = in_flight.version().to_string();

    let dir = tempdir().expect("tempdir");
    let store = CorpusStore::open(dir.path().to_path_buf());
    store.write(&demo_snapshot(128).expect("demo")).expect("write");
    let previous = handle.reload(&store).expect("reload");
    assert_eq!(previous.as_deref(), Some(first_version.as_str()));

    // The query that grabbed the old snapshot still sees all of it.
    assert_eq!(in_flight.manifest().dims, 64);
    assert_eq!(handle.snapshot().expect("snapshot").manifest().dims, 128);
}

#[test]
fn failed_reload_keeps_current_snapshot() {
    let handle = CorpusHandle::new(demo_snapshot(64).expect("demo"));
    let dir = tempdir().expect("tempdir");
    assert!(handle.reload(&CorpusStore::open(dir.path().to_path_buf())).is_err());
    assert_eq!(handle.snapshot().expect("snapshot").manifest().dims, 64);
}
