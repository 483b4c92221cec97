use sha2::{Digest, Sha256};
use triage_core::error::{codes, AppError};

use super::Embedder;

pub const HASHING_MODEL: &str = "hashing-v1";

/// Deterministic bag-of-tokens feature hashing.
///
/// Each whitespace token lands in one SHA-256-derived bucket; the result is L2-normalized.
/// Needs no model files, so the demo corpus and tests run offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(head) % self.dims as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        if model != HASHING_MODEL {
            return Err(AppError::new(codes::EMBEDDINGS_FAILED, "Unknown model for hashing embedder")
                .with_details(format!("model={model}; supported={HASHING_MODEL}")));
        }
        let mut v = vec![0.0f32; self.dims];
        let mut any = false;
        for token in input.split_whitespace() {
            v[self.bucket(&token.to_lowercase())] += 1.0;
            any = true;
        }
        if !any {
            return Err(AppError::new(codes::EMBEDDINGS_FAILED, "Embedding input is empty"));
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in v.iter_mut() {
            *x /= norm;
        }
        Ok(v)
    }
}
