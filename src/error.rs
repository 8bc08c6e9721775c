//! Error types for the notes2docx library.
//!
//! Every failure is fatal for the current conversion: there is no partial
//! document and nothing is retried. [`NotesError`] therefore carries enough
//! context to be shown to the user as-is, and [`NotesError::class`] groups
//! the variants into the coarse categories callers usually branch on
//! (configuration, input, authentication, request, empty response, document).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the notes2docx library.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but are not a PNG or JPEG image.
    #[error("Unsupported image '{name}': {detail}\nUpload a PNG or JPEG photo of the notes.")]
    UnsupportedImage { name: String, detail: String },

    /// The encoded image is still above the upload limit after downscaling.
    #[error("Image '{name}' is {bytes} bytes, above the {limit}-byte upload limit.\nLower --max-dimension or compress the photo.")]
    ImageTooLarge {
        name: String,
        bytes: usize,
        limit: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API key was configured for the selected engine.
    #[error("No API key configured for engine '{engine}'.\nSet {env_var} or pass the key explicitly.")]
    MissingCredential { engine: String, env_var: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transcription errors ──────────────────────────────────────────────
    /// The endpoint rejected the credential (HTTP 401/403).
    #[error("Authentication error from '{engine}': {detail}\nCheck that the API key is valid.")]
    AuthFailed { engine: String, detail: String },

    /// The request never produced an HTTP response.
    #[error("Request to '{engine}' failed: {reason}")]
    RequestFailed { engine: String, reason: String },

    /// The model call did not finish within the configured timeout.
    #[error("Request to '{engine}' timed out after {secs}s\nIncrease --api-timeout.")]
    RequestTimeout { engine: String, secs: u64 },

    /// HTTP 429 from the endpoint.
    #[error("Rate limit exceeded for '{engine}'")]
    RateLimited {
        engine: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success HTTP status.
    #[error("API error from '{engine}' (HTTP {status}): {message}")]
    ApiError {
        engine: String,
        status: u16,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Unreadable response from '{engine}': {detail}")]
    InvalidResponse { engine: String, detail: String },

    /// The model answered, but without any usable text.
    #[error("'{engine}' returned no text for this image.\nTry a sharper, better-lit photo.")]
    EmptyResponse { engine: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Serialising the Word document failed.
    #[error("Failed to build the Word document: {0}")]
    DocumentBuild(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of [`NotesError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid configuration, detected before any network call.
    Configuration,
    /// The image could not be read, downloaded or accepted.
    Input,
    /// The endpoint rejected the credential.
    Authentication,
    /// Network, timeout or non-success response from the endpoint.
    Request,
    /// The model returned no usable text.
    EmptyResponse,
    /// The document could not be serialised.
    DocumentBuild,
    /// The finished document could not be written.
    Output,
    Internal,
}

impl NotesError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            NotesError::FileNotFound { .. }
            | NotesError::PermissionDenied { .. }
            | NotesError::InvalidInput { .. }
            | NotesError::DownloadFailed { .. }
            | NotesError::DownloadTimeout { .. }
            | NotesError::UnsupportedImage { .. }
            | NotesError::ImageTooLarge { .. } => ErrorClass::Input,
            NotesError::MissingCredential { .. } | NotesError::InvalidConfig(_) => {
                ErrorClass::Configuration
            }
            NotesError::AuthFailed { .. } => ErrorClass::Authentication,
            NotesError::RequestFailed { .. }
            | NotesError::RequestTimeout { .. }
            | NotesError::RateLimited { .. }
            | NotesError::ApiError { .. }
            | NotesError::InvalidResponse { .. } => ErrorClass::Request,
            NotesError::EmptyResponse { .. } => ErrorClass::EmptyResponse,
            NotesError::DocumentBuild(_) => ErrorClass::DocumentBuild,
            NotesError::OutputWriteFailed { .. } => ErrorClass::Output,
            NotesError::Internal(_) => ErrorClass::Internal,
        }
    }
}
