//! Upload handling: validate an uploaded file and stage it for the rasteriser.
//!
//! pdfium wants a file-system path, so the uploaded bytes are written to a
//! [`tempfile::NamedTempFile`] that lives only as long as [`StagedPdf`]. The
//! file is removed when the value is dropped, whether conversion succeeded,
//! failed, or panicked.

use crate::error::OcrError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A file handed to the session by the user.
#[derive(Clone)]
pub struct Upload {
    /// Original file name, used for type checking and messages.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file into an upload.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                OcrError::Conversion {
                    name: path.display().to_string(),
                    detail: e.to_string(),
                }
            }
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self { file_name, bytes })
    }

    /// Download a PDF over HTTP(S) into an upload.
    pub async fn from_url(url: &str, timeout_secs: u64) -> Result<Self, OcrError> {
        info!("Downloading PDF from: {}", url);
        let failed = |reason: String| OcrError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| failed(e.to_string()))?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                failed(format!("timed out after {timeout_secs}s"))
            } else {
                failed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let file_name = filename_from_url(url);
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(Self {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    /// Reject anything that is not PDF-typed: `.pdf` extension and `%PDF` magic.
    pub fn validate(&self) -> Result<(), OcrError> {
        let has_pdf_ext = Path::new(&self.file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let magic: Vec<u8> = self.bytes.iter().take(4).copied().collect();
        if !has_pdf_ext || magic != b"%PDF" {
            return Err(OcrError::NotAPdf {
                name: self.file_name.clone(),
                magic,
            });
        }
        Ok(())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Last path segment of a URL, with `.pdf` appended unless it already ends in `.pdf`.
///
/// Servers often drop the extension (`/pdf/1706.03762`); the `%PDF` magic
/// check still decides whether the body is a PDF.
fn filename_from_url(url: &str) -> String {
    let last = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });
    match last {
        Some(last) if last.is_empty() => "downloaded.pdf".to_string(),
        Some(last)
            if Path::new(&last)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) =>
        {
            last
        }
        Some(last) => format!("{last}.pdf"),
        None => "downloaded.pdf".to_string(),
    }
}

/// An upload written to a temporary `.pdf` file.
pub struct StagedPdf {
    file: NamedTempFile,
}

impl StagedPdf {
    /// Validate `upload` and write it to a fresh temp file.
    pub fn stage(upload: &Upload) -> Result<Self, OcrError> {
        upload.validate()?;
        let staging_err = |e: std::io::Error| OcrError::Conversion {
            name: upload.file_name.clone(),
            detail: format!("could not stage upload: {e}"),
        };
        let mut file = tempfile::Builder::new()
            .prefix("ocr-upload-")
            .suffix(".pdf")
            .tempfile()
            .map_err(staging_err)?;
        file.write_all(&upload.bytes).map_err(staging_err)?;
        file.flush().map_err(staging_err)?;
        debug!("Staged {} at {}", upload.file_name, file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Where the file lives; it no longer exists once `self` is dropped.
    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}
