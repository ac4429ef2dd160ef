//! The catalogue of selectable vision models.
//!
//! The selector offers a fixed list of quantised Qwen3-VL variants published
//! under the `mlx-community` organisation. Identifiers are passed verbatim to
//! the model loader; the short name after the slash is what the user sees.

use serde::{Deserialize, Serialize};

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Full identifier, e.g. `mlx-community/Qwen3-VL-2B-Instruct-4bit`.
    pub identifier: String,
    /// Approximate download size shown next to the selector.
    pub download_hint: Option<String>,
}

impl ModelInfo {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let download_hint = download_hint(&identifier).map(str::to_string);
        Self {
            identifier,
            download_hint,
        }
    }

    /// Name shown in the selector: everything after the last `/`.
    pub fn display_name(&self) -> &str {
        display_name(&self.identifier)
    }
}

/// The five identifiers offered by default.
pub const KNOWN_MODELS: [&str; 5] = [
    "mlx-community/Qwen3-VL-2B-Instruct-4bit",
    "mlx-community/Qwen3-VL-2B-Instruct-8bit",
    "mlx-community/Qwen3-VL-8B-Instruct-4bit",
    "mlx-community/Qwen3-VL-8B-Instruct-8bit",
    "mlx-community/Qwen3-VL-32B-Instruct-4bit",
];

/// Ordered list of models offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(KNOWN_MODELS)
    }
}

impl ModelCatalog {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: identifiers.into_iter().map(ModelInfo::new).collect(),
        }
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// The default selection (first entry).
    pub fn first(&self) -> Option<&ModelInfo> {
        self.models.first()
    }

    pub fn get(&self, identifier: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.identifier == identifier)
    }

    /// Organisation prefix of the first entry, shown in the selector header.
    pub fn provider_label(&self) -> Option<&str> {
        self.first()
            .and_then(|m| m.identifier.split('/').next())
            .filter(|s| !s.is_empty())
    }

    /// Resolve user input: a 1-based index into the list, a full identifier,
    /// or a short display name.
    pub fn resolve(&self, input: &str) -> Option<&ModelInfo> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| self.models.get(i));
        }
        self.get(input)
            .or_else(|| self.models.iter().find(|m| m.display_name() == input))
    }
}

/// Everything after the last `/` in an identifier.
pub fn display_name(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}

/// Approximate download size by parameter count and quantisation.
fn download_hint(identifier: &str) -> Option<&'static str> {
    let has = |needle: &str| identifier.contains(needle);
    // Match "32B" before "2B" since the latter is a substring of the former.
    let size = if has("32B") {
        "32B"
    } else if has("8B") {
        "8B"
    } else if has("2B") {
        "2B"
    } else {
        return None;
    };
    match (size, has("4bit"), has("8bit")) {
        ("2B", true, _) => Some("~0.7GB download"),
        ("2B", _, true) => Some("~1.5GB download"),
        ("8B", true, _) => Some("~2.5GB download"),
        ("8B", _, true) => Some("~5GB download"),
        ("32B", true, _) => Some("~10GB download"),
        _ => None,
    }
}
