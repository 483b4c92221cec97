use serde::{Deserialize, Serialize};
use triage_core::error::{codes, AppError};

use super::Embedder;
use crate::ollama::OllamaClient;

/// Embeds canonical symptom text through a locally served Ollama model (`/api/embed`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

fn failed(message: &str) -> AppError {
    AppError::new(codes::EMBEDDINGS_FAILED, message)
}

/// A single finite vector, or an error naming what was wrong with the reply.
fn single_vector(resp: EmbedResponse, model: &str) -> Result<Vec<f32>, AppError> {
    let mut embeddings = resp.embeddings;
    if embeddings.len() != 1 {
        return Err(failed("Expected exactly one embedding")
            .with_details(format!("model={model}; got={}", embeddings.len())));
    }
    let v = embeddings.remove(0);
    if v.is_empty() {
        return Err(failed("Embedding was empty").with_details(format!("model={model}")));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(failed("Embedding contains non-finite values").with_details(format!("model={model}")));
    }
    Ok(v)
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        if input.trim().is_empty() {
            return Err(failed("Nothing to embed"));
        }
        let url = format!("{}/api/embed", self.client.base_url());
        let body = serde_json::to_value(EmbedRequest {
            model,
            input,
            truncate: true,
        })
        .map_err(|e| failed("Failed to encode embed request").with_details(e.to_string()))?;

        match ureq::post(&url).timeout(self.client.timeout()).send_json(body) {
            Ok(r) => {
                let parsed: EmbedResponse = r
                    .into_json()
                    .map_err(|e| failed("Failed to decode embed response").with_details(e.to_string()))?;
                let v = single_vector(parsed, model)?;
                tracing::debug!(model, dims = v.len(), "ollama embedding");
                Ok(v)
            }
            // Unknown model or bad request: retrying will not help.
            Err(ureq::Error::Status(status, _)) => {
                Err(failed("Embed request rejected").with_details(format!("status={status}; model={model}")))
            }
            Err(e) => Err(failed("Failed to call Ollama embed endpoint")
                .with_details(e.to_string())
                .with_retryable(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(raw: &str) -> EmbedResponse {
        serde_json::from_str(raw).expect("decode")
    }

    #[test]
    fn accepts_one_finite_vector() {
        let v = single_vector(resp(r#"{"model":"m","embeddings":[[0.1,0.2,0.3]]}"#), "m").expect("vector");
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn rejects_missing_batched_or_empty_vectors() {
        for raw in [
            r#"{"model":"m"}"#,
            r#"{"embeddings":[[0.1],[0.2]]}"#,
            r#"{"embeddings":[[]]}"#,
        ] {
            let err = single_vector(resp(raw), "m").unwrap_err();
            assert_eq!(err.code, codes::EMBEDDINGS_FAILED, "{raw}");
            assert!(!err.retryable);
        }
    }

    #[test]
    fn blank_input_fails_without_a_request() {
        let client = OllamaClient::new("http://127.0.0.1:9").expect("client");
        let err = OllamaEmbedder::new(client).embed("m", "  ").unwrap_err();
        assert_eq!(err.message, "Nothing to embed");
    }
}
