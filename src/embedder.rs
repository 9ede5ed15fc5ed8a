use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ort::Environment;
use rust_bert::pipelines::hf_tokenizers::HFTokenizer;
use rust_bert::pipelines::onnx::{config::ONNXEnvironmentConfig, ONNXEncoder};
use tch::{Kind, Tensor};
use tracing::debug;

/// Turns query text into a vector comparable with the index's `full_vector` field.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

struct Model {
    encoder: ONNXEncoder,
    tokenizer: HFTokenizer,
}

/// Sentence encoder backed by an ONNX export of `multi-qa-MiniLM-L6-cos-v1`.
///
/// The model directory must contain `model.onnx`, `tokenizer.json` and
/// `special_tokens_map.json`.
#[derive(Clone)]
pub struct OnnxEncoder {
    model: Arc<Mutex<Model>>,
}

impl OnnxEncoder {
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let environment = Arc::new(
            Environment::builder()
                .with_name("nutrichat-encoder")
                .build()?,
        );
        let onnx_config = ONNXEnvironmentConfig::default();
        let encoder = ONNXEncoder::new(model_dir.join("model.onnx"), &environment, &onnx_config)
            .map_err(|e| anyhow!("model loading failed: {e}"))?;
        let tokenizer = HFTokenizer::from_file(
            model_dir.join("tokenizer.json"),
            model_dir.join("special_tokens_map.json"),
        )
        .map_err(|e| anyhow!("tokenizer loading failed: {e}"))?;

        Ok(Self {
            model: Arc::new(Mutex::new(Model { encoder, tokenizer })),
        })
    }
}

impl Model {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode_list(&[text])
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let token_ids = encoding
            .into_iter()
            .next()
            .map(|enc| enc.token_ids)
            .ok_or_else(|| anyhow!("tokenizer returned no encoding"))?;

        let input_ids = Tensor::from_slice(&token_ids)
            .view([1, -1])
            .to_kind(Kind::Int64);
        let attention_mask = input_ids.ones_like();
        let token_type_ids = input_ids.zeros_like();

        let output = self.encoder.forward(
            Some(&input_ids),
            Some(&attention_mask),
            Some(&token_type_ids),
            None,
            None,
        )?;
        let hidden = output
            .last_hidden_state
            .ok_or_else(|| anyhow!("empty last_hidden_state"))?;

        let pooled = mean_pool(&hidden, &attention_mask);
        Vec::<f32>::try_from(normalize(&pooled).squeeze())
            .map_err(|_| anyhow!("Tensor conversion failed"))
    }
}

/// Averages token embeddings over the positions covered by `mask`.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> Tensor {
    let mask = mask.unsqueeze(-1).to_kind(Kind::Float);
    let summed = (hidden.to_kind(Kind::Float) * &mask).sum_dim_intlist(
        &[1_i64][..],
        false,
        Kind::Float,
    );
    let counts = mask
        .sum_dim_intlist(&[1_i64][..], false, Kind::Float)
        .clamp_min(1e-9);
    summed / counts
}

/// L2-normalizes each row.
fn normalize(embeddings: &Tensor) -> Tensor {
    embeddings / embeddings.norm_scalaropt_dim(2, [1], true)
}

#[async_trait]
impl Encoder for OnnxEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let vector = tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|_| anyhow!("encoder lock poisoned"))?;
            model.embed(&text)
        })
        .await
        .context("encoder task failed")??;
        debug!("Encoded query into {} dimensions", vector.len());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use tch::{Kind, Tensor};

    use super::{mean_pool, normalize};

    #[test]
    fn mean_pool_ignores_masked_tokens() {
        let hidden = Tensor::from_slice(&[1.0_f32, 2.0, 3.0, 4.0, 100.0, 100.0]).view([1, 3, 2]);
        let mask = Tensor::from_slice(&[1_i64, 1, 0]).view([1, 3]);
        let pooled = mean_pool(&hidden, &mask);
        let values = Vec::<f32>::try_from(pooled.squeeze()).unwrap();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn normalized_rows_have_unit_length() {
        let rows = Tensor::from_slice(&[3.0_f32, 4.0]).view([1, 2]);
        let values = Vec::<f32>::try_from(normalize(&rows).squeeze().to_kind(Kind::Float)).unwrap();
        assert!((values[0] - 0.6).abs() < 1e-6);
        assert!((values[1] - 0.8).abs() < 1e-6);
    }
}
