//! OCR prompts and the model-specific prompt formatter.
//!
//! The user edits a raw prompt in the session form. Before generation it is
//! turned into a [`FormattedPrompt`] shaped for the loaded model family:
//! Qwen-VL checkpoints ship their own chat template and want the bare
//! instruction, while unknown families get a short system preamble that
//! frames the task as transcription.

use crate::error::OcrError;
use crate::pipeline::encode::ImageProcessor;
use crate::pipeline::llm::{ModelConfig, ModelFamily};
use serde::{Deserialize, Serialize};

/// Prompt pre-filled in the prompt field.
pub const DEFAULT_OCR_PROMPT: &str = "Extract all text and table from this image. \
Preserve the layout and formatting as much as possible.\n\nOutput pretty formatted markdown";

/// System preamble for model families without a dedicated template.
pub const GENERIC_SYSTEM_PREAMBLE: &str = "You are a precise OCR engine. \
Transcribe the attached page image exactly as instructed. \
Output only the transcription, without commentary.";

/// A prompt ready to be sent alongside `image_count` page images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedPrompt {
    /// Optional system message.
    pub system: Option<String>,
    /// Text of the user turn that carries the images.
    pub text: String,
    /// Number of images the user turn expects.
    pub image_count: usize,
}

/// Shape `raw` for the model described by `config`.
///
/// Fails when the prompt is blank or the image count is outside what the
/// processor accepts.
pub fn format_prompt(
    processor: &ImageProcessor,
    config: &ModelConfig,
    raw: &str,
    image_count: usize,
) -> Result<FormattedPrompt, OcrError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(OcrError::inference("prompt is empty"));
    }
    if image_count == 0 || image_count > processor.max_images {
        return Err(OcrError::inference(format!(
            "{} accepts 1–{} images per request, got {}",
            config.identifier, processor.max_images, image_count
        )));
    }

    let system = match config.family {
        ModelFamily::QwenVl => None,
        ModelFamily::Generic => Some(GENERIC_SYSTEM_PREAMBLE.to_string()),
    };

    Ok(FormattedPrompt {
        system,
        text: text.to_string(),
        image_count,
    })
}
