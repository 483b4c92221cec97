mod handle;
mod model;
mod store;

pub mod demo;

pub use handle::{CorpusHandle, CorpusSnapshot};
pub use model::{ChunkDraft, CorpusManifest, DocumentChunk};
pub use store::{build_with_embedder, content_fingerprint, sha256_hex, CorpusStore};
