use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use triage_core::error::{codes, AppError};

use super::handle::CorpusSnapshot;
use super::model::{ChunkDraft, CorpusManifest, DocumentChunk};
use crate::embeddings::Embedder;

pub fn sha256_hex(input: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(input);
    hex::encode(h.finalize())
}

/// Fingerprint over chunk ids and text hashes, in corpus order.
pub fn content_fingerprint(chunks: &[DocumentChunk]) -> String {
    let mut h = Sha256::new();
    for c in chunks {
        h.update(c.chunk_id.as_bytes());
        h.update(b"\n");
        h.update(c.text_sha256.as_bytes());
        h.update(b"\n");
    }
    hex::encode(h.finalize())
}

/// Offline corpus builder: hash and embed every draft, then stamp a manifest.
pub fn build_with_embedder(
    drafts: &[ChunkDraft],
    embedder: &dyn Embedder,
    model: &str,
    version: &str,
    built_at: &str,
) -> Result<CorpusSnapshot, AppError> {
    let mut chunks = Vec::with_capacity(drafts.len());
    let mut dims: Option<usize> = None;
    for d in drafts {
        let embedding = embedder.embed(model, &d.embedding_input()).map_err(|e| {
            AppError::new(codes::EMBEDDINGS_FAILED, "Failed to embed corpus chunk")
                .with_details(format!("chunk_id={}; err={}", d.chunk_id, e))
        })?;
        match dims {
            None => dims = Some(embedding.len()),
            Some(n) if n != embedding.len() => {
                return Err(AppError::new(
                    codes::EMBEDDINGS_FAILED,
                    "Embedder returned inconsistent dims",
                )
                .with_details(format!("chunk_id={}; expected={n}; got={}", d.chunk_id, embedding.len())));
            }
            Some(_) => {}
        }
        chunks.push(DocumentChunk {
            chunk_id: d.chunk_id.clone(),
            text: d.text.clone(),
            source: d.source.clone(),
            source_label: d.source_label.clone(),
            authority: d.authority,
            language: d.language,
            cross_language: d.cross_language,
            malaria_relevant: d.malaria_relevant,
            symptoms: d.symptoms.clone(),
            text_sha256: sha256_hex(d.text.as_bytes()),
            embedding,
        });
    }

    let manifest = CorpusManifest {
        version: version.to_string(),
        embedding_model: model.to_string(),
        dims: dims.unwrap_or(0) as u32,
        chunk_count: chunks.len() as u32,
        content_sha256: content_fingerprint(&chunks),
        built_at: built_at.to_string(),
    };
    CorpusSnapshot::new(manifest, chunks)
}

/// On-disk corpus: `manifest.json` plus `chunks.json` in one directory.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn chunks_path(&self) -> PathBuf {
        self.root.join("chunks.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root.as_path()).map_err(|e| {
            AppError::new(codes::CORPUS_STORE_FAILED, "Failed to create corpus directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    /// Manifest of the stored corpus, or `None` when nothing has been written yet.
    pub fn status(&self) -> Result<Option<CorpusManifest>, AppError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path, "corpus manifest").map(Some)
    }

    pub fn load(&self) -> Result<CorpusSnapshot, AppError> {
        let manifest: CorpusManifest = self.status()?.ok_or_else(|| {
            AppError::new(codes::CORPUS_STORE_FAILED, "Corpus manifest missing")
                .with_details(format!("path={}", self.manifest_path().display()))
        })?;
        let chunks: Vec<DocumentChunk> = read_json(&self.chunks_path(), "corpus chunks")?;
        let snapshot = CorpusSnapshot::new(manifest, chunks)?;
        tracing::info!(
            version = %snapshot.version(),
            chunks = snapshot.len(),
            path = %self.root.display(),
            "corpus loaded"
        );
        Ok(snapshot)
    }

    /// Chunks are written first and the manifest last, each via tmp-then-rename, so a reader
    /// never pairs a new manifest with old chunks.
    pub fn write(&self, snapshot: &CorpusSnapshot) -> Result<(), AppError> {
        self.ensure_dirs()?;
        let chunks: Vec<&DocumentChunk> = snapshot.chunks().iter().map(|c| c.as_ref()).collect();
        write_json_atomic(&self.chunks_path(), &chunks, "corpus chunks")?;
        write_json_atomic(&self.manifest_path(), snapshot.manifest(), "corpus manifest")?;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}
