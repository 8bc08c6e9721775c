//! Result types returned by the conversion entry points.

use crate::pipeline::mapper::StructuralBlock;
use serde::Serialize;

/// Everything one conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Model output after cleanup, exactly as it was mapped.
    pub transcription: String,

    /// Blocks in document order.
    pub blocks: Vec<StructuralBlock>,

    /// The `.docx` package. Not serialised.
    #[serde(skip)]
    pub docx: Vec<u8>,

    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Markdown rendering of [`Self::blocks`].
    pub fn to_plain_text(&self) -> String {
        crate::pipeline::mapper::to_plain_text(&self.blocks)
    }
}

/// Timing and usage figures for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub engine: String,
    pub model: String,
    /// Pixel size of the source image.
    pub image_width: u32,
    pub image_height: u32,
    /// Pixel size actually sent (after downscaling).
    pub sent_width: u32,
    pub sent_height: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub block_count: usize,
    pub docx_bytes: usize,
    pub transcribe_duration_ms: u64,
    pub total_duration_ms: u64,
}
