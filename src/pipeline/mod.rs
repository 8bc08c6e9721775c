//! Pipeline stages for image-to-docx conversion.
//!
//! Each submodule implements exactly one transformation step and is tested
//! on its own; only [`transcribe`] performs network I/O.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ transcribe ──▶ cleanup ──▶ mapper ──▶ docx
//! (path/URL) (base64)   (VLM)        (artefacts)  (blocks)   (OOXML)
//! ```
//!
//! 1. [`input`]      — read a local file or download a URL; sniff PNG/JPEG
//! 2. [`encode`]     — downscale oversized photos and build the data URI
//! 3. [`transcribe`] — one bounded model call; rejects blank answers
//! 4. [`cleanup`]    — deterministic removal of model artefacts
//! 5. [`mapper`]     — ordered line rules → structural blocks
//! 6. [`docx`]       — render blocks into a `.docx` package

pub mod cleanup;
pub mod docx;
pub mod encode;
pub mod input;
pub mod mapper;
pub mod transcribe;
