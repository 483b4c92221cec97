use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use triage_core::error::{codes, AppError};

use super::model::{CorpusManifest, DocumentChunk};
use super::store::{content_fingerprint, sha256_hex, CorpusStore};

fn mismatch(message: &str, details: String) -> AppError {
    AppError::new(codes::CORPUS_VERSION_MISMATCH, message).with_details(details)
}

/// Immutable, verified corpus version. Queries hold an `Arc` to one snapshot for their whole
/// lifetime.
#[derive(Debug)]
pub struct CorpusSnapshot {
    manifest: CorpusManifest,
    chunks: Vec<Arc<DocumentChunk>>,
}

impl CorpusSnapshot {
    pub fn new(manifest: CorpusManifest, chunks: Vec<DocumentChunk>) -> Result<Self, AppError> {
        if manifest.version.trim().is_empty() {
            return Err(mismatch("Corpus manifest has no version", String::new()));
        }
        if OffsetDateTime::parse(&manifest.built_at, &Rfc3339).is_err() {
            return Err(mismatch(
                "Corpus built_at is not RFC3339",
                format!("built_at={}", manifest.built_at),
            ));
        }
        if manifest.chunk_count as usize != chunks.len() {
            return Err(mismatch(
                "Corpus chunk count does not match manifest",
                format!("manifest={}; chunks={}", manifest.chunk_count, chunks.len()),
            ));
        }

        let mut ids = BTreeSet::new();
        for c in &chunks {
            if !ids.insert(c.chunk_id.as_str()) {
                return Err(mismatch("Duplicate chunk id", format!("chunk_id={}", c.chunk_id)));
            }
            if c.embedding.len() != manifest.dims as usize {
                return Err(mismatch(
                    "Chunk embedding dims do not match manifest",
                    format!("chunk_id={}; expected={}; got={}", c.chunk_id, manifest.dims, c.embedding.len()),
                ));
            }
            if c.embedding.iter().any(|x| !x.is_finite()) {
                return Err(mismatch(
                    "Chunk embedding contains non-finite values",
                    format!("chunk_id={}", c.chunk_id),
                ));
            }
            if sha256_hex(c.text.as_bytes()) != c.text_sha256 {
                return Err(mismatch("Chunk text hash mismatch", format!("chunk_id={}", c.chunk_id)));
            }
        }

        let fingerprint = content_fingerprint(&chunks);
        if fingerprint != manifest.content_sha256 {
            return Err(mismatch(
                "Corpus content fingerprint does not match manifest",
                format!("manifest={}; computed={}", manifest.content_sha256, fingerprint),
            ));
        }

        Ok(Self {
            manifest,
            chunks: chunks.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn chunks(&self) -> &[Arc<DocumentChunk>] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Process-wide pointer to the current snapshot.
///
/// The lock only guards the pointer swap; readers clone the `Arc` and drop the guard at once,
/// so a publish never blocks behind a running query.
#[derive(Debug, Default)]
pub struct CorpusHandle {
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
}

impl CorpusHandle {
    pub fn new(snapshot: CorpusSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// A handle with no corpus; every query reports retrieval as unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Swap in a new snapshot. Returns the version it replaced.
    pub fn publish(&self, snapshot: CorpusSnapshot) -> Option<String> {
        let next = Arc::new(snapshot);
        let version = next.version().to_string();
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.replace(next)
        };
        let previous_version = previous.map(|p| p.version().to_string());
        tracing::info!(
            version = %version,
            previous = previous_version.as_deref().unwrap_or("none"),
            "corpus snapshot published"
        );
        previous_version
    }

    /// Load from disk, then publish. On failure the current snapshot stays in place.
    pub fn reload(&self, store: &CorpusStore) -> Result<Option<String>, AppError> {
        let snapshot = store.load()?;
        Ok(self.publish(snapshot))
    }
}
