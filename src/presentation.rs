//! Presenting an extraction result: display modes and the download artifact.
//!
//! The display mode is only a toggle over how the same text is shown. Plain
//! mode prints it verbatim; rendered mode styles the Markdown for a terminal
//! with pulldown-cmark. The underlying [`ExtractionResult::text`] is never
//! modified, and the download artifact always carries it byte-for-byte.
//!
//! [`PagePreview`] exports the page image the model is shown, so it can be
//! opened in an image viewer next to the extracted text.

use crate::error::OcrError;
use crate::session::{Document, ExtractionResult};
use image::{DynamicImage, ImageFormat};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// How the result text is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Verbatim text. (default)
    #[default]
    Plain,
    /// Markdown rendered with terminal styling.
    Rendered,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(DisplayMode::Plain),
            "rendered" | "render" | "markdown" | "md" => Ok(DisplayMode::Rendered),
            other => Err(format!("unknown display mode '{other}' (plain | rendered)")),
        }
    }
}

/// A result prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View<'a> {
    pub heading: String,
    pub mode: DisplayMode,
    /// The text as stored in the session, untouched.
    pub source: &'a str,
    /// What the terminal should print.
    pub body: String,
}

/// Prepare `result` for display in `mode`.
pub fn present(result: &ExtractionResult, mode: DisplayMode) -> View<'_> {
    let body = match mode {
        DisplayMode::Plain => result.text.clone(),
        DisplayMode::Rendered => render_markdown(&result.text),
    };
    View {
        heading: format!("Extracted Text (Page {})", result.page_num),
        mode,
        source: &result.text,
        body,
    }
}

// ── Terminal Markdown rendering ──────────────────────────────────────────

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Render Markdown with ANSI styling for a terminal.
pub fn render_markdown(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() + markdown.len() / 4);
    // One entry per open list; `Some(n)` is the next ordered-list number.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut in_code_block = false;
    let mut first_cell = true;

    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let color = if level == HeadingLevel::H1 { CYAN } else { "" };
                out.push_str(BOLD);
                out.push_str(color);
            }
            Event::End(TagEnd::Heading(_)) => {
                out.push_str(RESET);
                out.push_str("\n\n");
            }
            Event::End(TagEnd::Paragraph) => out.push_str("\n\n"),
            Event::Start(Tag::Strong) => out.push_str(BOLD),
            Event::Start(Tag::Emphasis) => out.push_str(ITALIC),
            Event::End(TagEnd::Strong) | Event::End(TagEnd::Emphasis) => out.push_str(RESET),
            Event::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                out.push_str(DIM);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                out.push_str(RESET);
                out.push('\n');
            }
            Event::Start(Tag::List(start)) => lists.push(start),
            Event::End(TagEnd::List(_)) => {
                lists.pop();
                if lists.is_empty() {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::TableHead) => {
                first_cell = true;
                out.push_str(BOLD);
            }
            Event::End(TagEnd::TableHead) => {
                out.push_str(RESET);
                out.push('\n');
            }
            Event::Start(Tag::TableRow) => first_cell = true,
            Event::End(TagEnd::TableRow) => out.push('\n'),
            Event::Start(Tag::TableCell) => {
                if !first_cell {
                    out.push_str(" │ ");
                }
                first_cell = false;
            }
            Event::End(TagEnd::Table) => out.push('\n'),
            Event::Text(text) => {
                if in_code_block {
                    for line in text.lines() {
                        out.push_str("    ");
                        out.push_str(line);
                        out.push('\n');
                    }
                } else {
                    out.push_str(&text);
                }
            }
            Event::Code(code) => {
                out.push_str(DIM);
                out.push_str(&code);
                out.push_str(RESET);
            }
            Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("────────────────────────────────────────\n\n"),
            _ => {}
        }
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

// ── Download artifact ────────────────────────────────────────────────────

/// The file offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// `ocr_page_<N>.txt`
    pub file_name: String,
    /// Always `text/plain`.
    pub mime_type: &'static str,
    pub contents: Vec<u8>,
}

impl DownloadArtifact {
    pub fn for_result(result: &ExtractionResult) -> Self {
        Self {
            file_name: format!("ocr_page_{}.txt", result.page_num),
            mime_type: "text/plain",
            contents: result.text.as_bytes().to_vec(),
        }
    }

    /// Write the artifact into `dir` and return its path.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, OcrError> {
        let path = write_atomically(dir.as_ref(), &self.file_name, &self.contents).await?;
        info!("Saved {} ({} bytes)", path.display(), self.contents.len());
        Ok(path)
    }
}

/// The selected page image, exportable as `page_<N>.png`.
#[derive(Debug, Clone)]
pub struct PagePreview {
    pub page_num: usize,
    /// `page_<N>.png`
    pub file_name: String,
    image: Arc<DynamicImage>,
}

impl PagePreview {
    /// Preview of the document's current page.
    pub fn for_document(document: &Document) -> Self {
        let page_num = document.current_page();
        Self {
            page_num,
            file_name: format!("page_{page_num}.png"),
            image: Arc::clone(document.current_image()),
        }
    }

    /// Pixel size as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Encode the page as PNG and write it into `dir`.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, OcrError> {
        let dir = dir.as_ref();
        let mut png = Cursor::new(Vec::new());
        self.image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| OcrError::OutputWriteFailed {
                path: dir.join(&self.file_name),
                source: std::io::Error::other(e),
            })?;
        let png = png.into_inner();
        let path = write_atomically(dir, &self.file_name, &png).await?;
        let (w, h) = self.dimensions();
        info!("Saved {} ({}x{} px)", path.display(), w, h);
        Ok(path)
    }
}

/// Write `contents` to `dir/file_name` via a temp file and rename, so a crash
/// never leaves a truncated file behind.
async fn write_atomically(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf, OcrError> {
    let path = dir.join(file_name);
    let write_err = |source: std::io::Error| OcrError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
    let tmp_path = dir.join(format!("{file_name}.tmp"));
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;
    Ok(path)
}
