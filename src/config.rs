//! Configuration types for an OCR session.
//!
//! All session behaviour is controlled through [`SessionConfig`], built via
//! [`SessionConfigBuilder`]. The decoding parameters for extraction are fixed
//! per session ([`GenerationOptions`]); the user only edits the prompt.

use crate::error::OcrError;
use crate::models::ModelCatalog;
use crate::prompts::DEFAULT_OCR_PROMPT;
use serde::{Deserialize, Serialize};

/// Decoding parameters passed to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens the model may generate for one page. Default: 2048.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model faithful to what it sees, so this stays
    /// close to zero.
    pub temperature: f32,

    /// Log the formatted prompt and token counts at INFO level. Default: false.
    pub verbose: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.1,
            verbose: false,
        }
    }
}

/// Configuration for an OCR session.
///
/// # Example
/// ```rust
/// use edgequake_ocr_session::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .dpi(150)
///     .provider_name("ollama")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Rasterisation resolution. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    ///
    /// A 200-DPI render of a poster-sized page would otherwise allocate
    /// hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// Decoding parameters for extraction.
    pub generation: GenerationOptions,

    /// edgequake-llm provider name used to serve the models. Default: "ollama".
    pub provider_name: String,

    /// Models offered in the selector.
    pub catalog: ModelCatalog,

    /// Prompt pre-filled in the prompt field.
    pub default_prompt: String,

    /// Run a one-token generation right after load. Default: true.
    ///
    /// Local servers load weights lazily; warming up makes an unavailable
    /// identifier fail at load time instead of at the first extraction.
    pub warmup_on_load: bool,

    /// Timeout for `open <url>` downloads, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
            generation: GenerationOptions::default(),
            provider_name: "ollama".to_string(),
            catalog: ModelCatalog::default(),
            default_prompt: DEFAULT_OCR_PROMPT.to_string(),
            warmup_on_load: true,
            download_timeout_secs: 120,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Identifier selected when a session starts.
    pub fn default_model(&self) -> String {
        self.catalog
            .first()
            .map(|m| m.identifier.clone())
            .unwrap_or_default()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.generation.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.config.generation.verbose = v;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.default_prompt = prompt.into();
        self
    }

    pub fn warmup_on_load(mut self, v: bool) -> Self {
        self.config.warmup_on_load = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, OcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(OcrError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.generation.max_tokens == 0 {
            return Err(OcrError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.catalog.is_empty() {
            return Err(OcrError::InvalidConfig(
                "the model catalogue must list at least one model".into(),
            ));
        }
        if c.provider_name.trim().is_empty() {
            return Err(OcrError::InvalidConfig("provider name is empty".into()));
        }
        Ok(self.config)
    }
}
