//! LLM integration for the job tracker.
//!
//! Supports:
//! - **Gemini**: Direct API access via rig-core
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const GEMINI: &str = "gemini";

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
}

impl LlmConfig {
    pub fn new(api_key: secrecy::SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Create an LLM provider from configuration.
///
/// Gemini is asked for `application/json` output; temperature and token
/// limits travel with each request.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;
    use rig::providers::gemini::completion::gemini_api_types::{
        AdditionalParameters, GenerationConfig,
    };

    let client: gemini::Client = gemini::Client::new(config.api_key.expose_secret()).map_err(
        |e| LlmError::RequestFailed {
            provider: GEMINI.to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        },
    )?;

    let generation = GenerationConfig {
        response_mime_type: Some("application/json".to_string()),
        ..Default::default()
    };
    let params = serde_json::to_value(AdditionalParameters::default().with_config(generation))
        .map_err(|e| LlmError::RequestFailed {
            provider: GEMINI.to_string(),
            reason: format!("Failed to encode generation config: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new(GEMINI, model, &config.model).with_additional_params(params),
    ))
}
