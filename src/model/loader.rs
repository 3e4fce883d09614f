//! Model loading utilities.
//!
//! This module provides functions for:
//! - Downloading checkpoints from HuggingFace Hub
//! - Loading SafeTensors weights
//! - Parsing config.json into a model-specific config

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::{api::sync::ApiRepo, api::sync::Api, Repo, RepoType};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Paths to downloaded model files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// Path to config.json.
    pub config: PathBuf,
    /// Paths to weight files (SafeTensors).
    pub weights: Vec<PathBuf>,
    /// Path to tokenizer.json.
    pub tokenizer: PathBuf,
}

/// Downloads model files from HuggingFace Hub.
///
/// # Arguments
///
/// * `model_id` - HuggingFace model ID (e.g., "bert-base-uncased")
/// * `revision` - Git revision. Use "main" for latest.
/// * `fallback_tokenizer_repo` - Repository to take `tokenizer.json` from
///   when `model_id` has none
pub fn download_model(
    model_id: &str,
    revision: &str,
    fallback_tokenizer_repo: Option<&str>,
) -> Result<ModelFiles> {
    let api = Api::new().map_err(|e| Error::ModelLoad(format!("Failed to create HF API: {e}")))?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    info!(model_id, revision, "downloading model files");

    let config = repo
        .get("config.json")
        .map_err(|e| Error::ModelLoad(format!("Failed to download config.json: {e}")))?;

    let weights = download_weights(&repo)?;

    let tokenizer = match (repo.get("tokenizer.json"), fallback_tokenizer_repo) {
        (Ok(path), _) => path,
        (Err(err), Some(fallback)) => {
            debug!(model_id, fallback, error = %err, "tokenizer.json missing, using fallback repo");
            api.model(fallback.to_string())
                .get("tokenizer.json")
                .map_err(|e| {
                    Error::ModelLoad(format!(
                        "Failed to download tokenizer.json from {fallback}: {e}"
                    ))
                })?
        }
        (Err(err), None) => {
            return Err(Error::ModelLoad(format!(
                "Failed to download tokenizer.json: {err}"
            )))
        }
    };

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Downloads model weight files.
fn download_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    // Sharded checkpoints list their files in the index
    if let Ok(index_path) = repo.get("model.safetensors.index.json") {
        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;

        let weight_map = index["weight_map"].as_object().ok_or_else(|| {
            Error::ModelLoad("Invalid safetensors index: missing weight_map".into())
        })?;

        let mut shard_files: Vec<String> = weight_map
            .values()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect();
        shard_files.sort();
        shard_files.dedup();

        let mut paths = Vec::with_capacity(shard_files.len());
        for filename in shard_files {
            let path = repo
                .get(&filename)
                .map_err(|e| Error::ModelLoad(format!("Failed to download {filename}: {e}")))?;
            paths.push(path);
        }
        return Ok(paths);
    }

    Err(Error::ModelLoad(
        "No SafeTensors weights found. Only SafeTensors checkpoints are supported.".into(),
    ))
}

/// Creates a VarBuilder from SafeTensors files.
///
/// # Safety
///
/// Uses memory-mapped file access. This is safe as long as the files are
/// not modified while being read.
#[allow(unsafe_code)]
pub fn load_safetensors(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    Ok(vb)
}

/// Parses a config.json into the requested config type.
pub fn load_config<C: DeserializeOwned>(path: &Path) -> Result<C> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ModelLoad(format!("Failed to read {}: {e}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::ModelLoad(format!("Failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bert::BertConfig;

    #[test]
    fn test_load_config_parses_file() {
        let dir = std::env::temp_dir().join(format!("lm-sampler-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"vocab_size": 30522, "hidden_size": 768, "num_hidden_layers": 12,
                "num_attention_heads": 12, "intermediate_size": 3072}"#,
        )
        .unwrap();

        let config: BertConfig = load_config(&path).unwrap();
        assert_eq!(config.vocab_size, 30522);
        assert_eq!(config.max_position_embeddings, 512);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config::<BertConfig>(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)));
    }
}
