//! Model loading and VLM generation.
//!
//! Two seams keep the session controller independent of any inference
//! backend:
//!
//! * [`ModelLoader`]: turns an identifier into a [`ModelHandle`]
//!   (model + image processor + config).
//! * [`VisionModel`]: runs one generation over a page image.
//!
//! The production pair ([`LlmModelLoader`] / [`LlmVisionModel`]) serves the
//! model through an edgequake-llm provider, typically a local server such as
//! Ollama or LM Studio. Tests plug in fakes.

use crate::config::GenerationOptions;
use crate::error::OcrError;
use crate::pipeline::encode::ImageProcessor;
use crate::prompts::FormattedPrompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Chat-template family of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Qwen2-VL / Qwen2.5-VL / Qwen3-VL checkpoints.
    QwenVl,
    /// Anything else.
    Generic,
}

/// Static configuration of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub identifier: String,
    pub family: ModelFamily,
}

impl ModelConfig {
    /// Derive the config from the identifier's naming convention.
    pub fn for_identifier(identifier: &str) -> Self {
        let lower = identifier.to_ascii_lowercase();
        let family = if lower.contains("qwen") && lower.contains("vl") {
            ModelFamily::QwenVl
        } else {
            ModelFamily::Generic
        };
        Self {
            identifier: identifier.to_string(),
            family,
        }
    }
}

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Generation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A model able to read a page image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Run one generation. Any failure maps to [`OcrError::Inference`].
    async fn generate(
        &self,
        processor: &ImageProcessor,
        prompt: &FormattedPrompt,
        image: &DynamicImage,
        options: &GenerationOptions,
    ) -> Result<Generation, OcrError>;
}

/// Produces model handles from identifiers.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load `identifier`. Any failure maps to [`OcrError::ModelLoad`].
    async fn load(&self, identifier: &str) -> Result<ModelHandle, OcrError>;
}

/// A loaded, ready-to-run model.
#[derive(Clone)]
pub struct ModelHandle {
    pub identifier: String,
    pub model: Arc<dyn VisionModel>,
    pub processor: ImageProcessor,
    pub config: ModelConfig,
}

impl ModelHandle {
    /// Handle with the default processor and a config derived from `identifier`.
    pub fn new(identifier: impl Into<String>, model: Arc<dyn VisionModel>) -> Self {
        let identifier = identifier.into();
        let config = ModelConfig::for_identifier(&identifier);
        Self {
            identifier,
            model,
            processor: ImageProcessor::default(),
            config,
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("identifier", &self.identifier)
            .field("model", &"<dyn VisionModel>")
            .field("processor", &self.processor)
            .field("config", &self.config)
            .finish()
    }
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// Loads models through an edgequake-llm provider.
pub struct LlmModelLoader {
    provider_name: String,
    warmup: bool,
}

impl LlmModelLoader {
    pub fn new(provider_name: impl Into<String>, warmup: bool) -> Self {
        Self {
            provider_name: provider_name.into(),
            warmup,
        }
    }
}

#[async_trait]
impl ModelLoader for LlmModelLoader {
    async fn load(&self, identifier: &str) -> Result<ModelHandle, OcrError> {
        let start = Instant::now();
        let load_err = |detail: String| OcrError::ModelLoad {
            identifier: identifier.to_string(),
            detail,
        };

        let provider = ProviderFactory::create_llm_provider(&self.provider_name, identifier)
            .map_err(|e| load_err(format!("provider '{}': {e}", self.provider_name)))?;

        if self.warmup {
            // A one-token request makes a lazy local server pull the weights now.
            let options = CompletionOptions {
                max_tokens: Some(1),
                temperature: Some(0.0),
                ..Default::default()
            };
            provider
                .chat(&[ChatMessage::user("Reply with OK.")], Some(&options))
                .await
                .map_err(|e| load_err(format!("warm-up failed: {e}")))?;
        }

        info!(
            "Loaded model {} via {} in {}ms",
            identifier,
            self.provider_name,
            start.elapsed().as_millis()
        );

        Ok(ModelHandle::new(
            identifier,
            Arc::new(LlmVisionModel { provider }),
        ))
    }
}

/// Generation through an edgequake-llm chat call with one image attached.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    async fn generate(
        &self,
        processor: &ImageProcessor,
        prompt: &FormattedPrompt,
        image: &DynamicImage,
        options: &GenerationOptions,
    ) -> Result<Generation, OcrError> {
        if prompt.image_count != 1 {
            return Err(OcrError::inference(format!(
                "prompt expects {} images but one page was supplied",
                prompt.image_count
            )));
        }
        let image_data = processor
            .prepare(image)
            .map_err(|e| OcrError::inference(format!("image encoding failed: {e}")))?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user_with_images(prompt.text.as_str(), vec![image_data]));

        if options.verbose {
            info!("Prompt: {:?}", prompt.text);
        }

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&build_options(options)))
            .await
            .map_err(|e| OcrError::inference(e.to_string()))?;

        let generation = Generation {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        };
        if options.verbose {
            info!(
                "Generated {} tokens ({} prompt) in {:?}",
                generation.output_tokens,
                generation.input_tokens,
                start.elapsed()
            );
        } else {
            debug!(
                "Generated {} tokens in {:?}",
                generation.output_tokens,
                start.elapsed()
            );
        }
        Ok(generation)
    }
}

/// Build `CompletionOptions` from the session's decoding parameters.
fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}
