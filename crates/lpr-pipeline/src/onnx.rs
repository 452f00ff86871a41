//! ONNX Runtime session construction with execution-provider fallback

use anyhow::{Context, Result};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
        TensorRTExecutionProvider,
    },
    session::{builder::GraphOptimizationLevel, Session},
};

use crate::config::ExecutionConfig;

/// Provider names tried in order, most preferred first
const FALLBACK_CHAIN: [&str; 3] = ["TensorRT", "CUDA", "CPU"];

/// Load `model_path`, falling back TensorRT -> CUDA -> CPU
///
/// The configured provider picks where the chain starts. Returns the session
/// and the name of the first provider whose session could be built.
pub fn create_session(
    model_path: &str,
    config: &ExecutionConfig,
    model_kind: &str,
) -> Result<(Session, String)> {
    let start = chain_start(&config.execution_provider);
    let mut last_error = None;
    let mut loaded = None;

    for &provider in &FALLBACK_CHAIN[start..] {
        tracing::info!(model = %model_path, provider = %provider, "Attempting execution provider");
        match build_session(model_path, config, providers_from(provider, config.device_id)) {
            Ok(session) => {
                loaded = Some((session, provider.to_string()));
                break;
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Execution provider failed");
                last_error = Some(e);
            }
        }
    }

    let Some((session, provider)) = loaded else {
        let error = last_error.unwrap_or_else(|| anyhow::anyhow!("No execution provider to try"));
        return Err(error.context(format!("Failed to load model from {}", model_path)));
    };

    telemetry::metrics::LPR_INFERENCE_SESSIONS
        .with_label_values(&[model_kind, &provider])
        .inc();

    tracing::info!(
        model = %model_path,
        kind = %model_kind,
        provider = %provider,
        device = config.device_id,
        "Loaded ONNX model"
    );

    Ok((session, provider))
}

/// Index into the fallback chain for a configured provider name; unknown names run on CPU
fn chain_start(preference: &str) -> usize {
    FALLBACK_CHAIN
        .iter()
        .position(|name| name.eq_ignore_ascii_case(preference))
        .unwrap_or(FALLBACK_CHAIN.len() - 1)
}

/// `provider` followed by every provider after it in the chain
fn providers_from(provider: &str, device_id: i32) -> Vec<ExecutionProviderDispatch> {
    let start = chain_start(provider);
    FALLBACK_CHAIN[start..]
        .iter()
        .map(|&name| match name {
            "TensorRT" => TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            "CUDA" => CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            _ => CPUExecutionProvider::default().build(),
        })
        .collect()
}

fn build_session(
    model_path: &str,
    config: &ExecutionConfig,
    providers: Vec<ExecutionProviderDispatch>,
) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(config.intra_threads)
        .context("Failed to set intra threads")?
        .with_inter_threads(config.inter_threads)
        .context("Failed to set inter threads")?
        .with_execution_providers(providers)
        .context("Failed to set execution providers")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_start_follows_preference() {
        assert_eq!(chain_start("tensorrt"), 0);
        assert_eq!(chain_start("CUDA"), 1);
        assert_eq!(chain_start("cpu"), 2);
        assert_eq!(chain_start("openvino"), 2);
    }

    #[test]
    fn test_providers_from_includes_fallbacks() {
        assert_eq!(providers_from("TensorRT", 0).len(), 3);
        assert_eq!(providers_from("CUDA", 0).len(), 2);
        assert_eq!(providers_from("CPU", 0).len(), 1);
    }
}
