//! Image intake: turn a user-supplied path, URL or byte buffer into a
//! validated [`SourceImage`].
//!
//! Images are small enough to keep in memory, so URL inputs are downloaded
//! straight into a buffer. The format is sniffed from the magic bytes rather
//! than trusted from the file extension, and the pixel dimensions are read
//! from the header without decoding the whole image.

use crate::error::NotesError;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Encoded formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// File extension used inside the `.docx` package.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub(crate) fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// A validated, still-encoded input image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    name: String,
    width: u32,
    height: u32,
}

impl SourceImage {
    /// Validate raw bytes as a PNG or JPEG image.
    ///
    /// `name` is only used in messages and the document's image part name.
    pub fn from_bytes(bytes: Vec<u8>, name: impl Into<String>) -> Result<Self, NotesError> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(NotesError::UnsupportedImage {
                name,
                detail: "file is empty".into(),
            });
        }

        let format = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => ImageFormat::Png,
            Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
            Ok(other) => {
                return Err(NotesError::UnsupportedImage {
                    name,
                    detail: format!("{other:?} images are not supported"),
                })
            }
            Err(_) => {
                let mut magic = [0u8; 4];
                let n = bytes.len().min(4);
                magic[..n].copy_from_slice(&bytes[..n]);
                return Err(NotesError::UnsupportedImage {
                    name,
                    detail: format!("unrecognised file signature {magic:?}"),
                });
            }
        };

        let (width, height) =
            image::ImageReader::with_format(Cursor::new(&bytes), format.to_image_format())
                .into_dimensions()
                .map_err(|e| NotesError::UnsupportedImage {
                    name: name.clone(),
                    detail: format!("corrupt {} header: {e}", format.extension()),
                })?;

        if width == 0 || height == 0 {
            return Err(NotesError::UnsupportedImage {
                name,
                detail: "image has no pixels".into(),
            });
        }

        debug!("Accepted {name}: {:?} {width}x{height}, {} bytes", format, bytes.len());

        Ok(Self {
            bytes,
            format,
            name,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolve the input string to a validated image.
///
/// If the input is a URL, download it. If it is a local file, read it.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceImage, NotesError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(NotesError::InvalidInput {
            input: input.to_string(),
        });
    }

    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Read a local image, distinguishing missing files from unreadable ones.
async fn resolve_local(path: &Path) -> Result<SourceImage, NotesError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => NotesError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => NotesError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    SourceImage::from_bytes(bytes, file_name(path))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceImage, NotesError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NotesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            NotesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            NotesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(NotesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            NotesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            NotesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    SourceImage::from_bytes(bytes.to_vec(), filename_from_url(url))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

/// Last non-empty path segment of the URL, or a generic name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-image".to_string()
}
