//! End-to-end tests against the live hosted endpoints.
//!
//! These tests read photos from `./test_cases/` and make real API calls.
//! They are gated behind `E2E_ENABLED` plus the engine's API key so they do
//! not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GROQ_API_KEY=gsk_... cargo test --test e2e -- --nocapture
//!
//! Expected photos (any PNG/JPEG of handwritten chemistry notes will do):
//!   test_cases/chemistry_notes.jpg
//!   test_cases/chemistry_diagram.png

use notes2docx::{
    convert, convert_to_file, ConversionConfig, Engine, StructuralBlock, TranscriptionMode,
};
use std::io::{Cursor, Read};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip unless E2E_ENABLED is set, the key for `$engine` is present and the
/// photo at `$path` exists. Evaluates to `(path, api_key)`.
macro_rules! e2e_skip_unless_ready {
    ($engine:expr, $path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let engine: Engine = $engine;
        let key = match std::env::var(engine.api_key_env()) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => {
                println!("SKIP: {} not set", engine.api_key_env());
                return;
            }
        };
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test photo not found: {}", p.display());
            return;
        }
        (p, key)
    }};
}

fn config(engine: Engine, key: String) -> ConversionConfig {
    ConversionConfig::builder()
        .engine(engine)
        .api_key(key)
        .api_timeout_secs(120)
        .build()
        .expect("valid config")
}

/// Basic sanity checks on a live transcription.
fn assert_transcription_quality(text: &str, blocks: &[StructuralBlock], context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] transcription is empty");

    let first_line = text.lines().next().unwrap_or("");
    assert!(
        !first_line.starts_with("```"),
        "[{context}] cleanup should strip outer fences, got: {first_line:?}"
    );

    let invisible = ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'];
    for ch in invisible {
        assert!(
            !text.contains(ch),
            "[{context}] transcription contains invisible char U+{:04X}",
            ch as u32
        );
    }

    let non_blank = text.lines().filter(|l| !l.trim().is_empty()).count();
    assert_eq!(
        blocks.len(),
        non_blank,
        "[{context}] one block per non-blank line"
    );

    println!(
        "[{context}] ✓  {} chars, {} blocks",
        text.len(),
        blocks.len()
    );
}

fn document_xml(docx: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).expect("docx is a zip archive");
    let mut part = archive.by_name("word/document.xml").expect("document part");
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

// ── Groq ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_groq_chemistry_notes() {
    let (path, key) =
        e2e_skip_unless_ready!(Engine::Groq, test_cases_dir().join("chemistry_notes.jpg"));
    let out_path = output_dir().join("chemistry_notes_groq.docx");

    let result = convert_to_file(path.to_str().unwrap(), &out_path, &config(Engine::Groq, key))
        .await
        .expect("conversion should succeed");

    assert_transcription_quality(&result.transcription, &result.blocks, "groq");
    assert!(result.stats.output_tokens > 0, "usage should be reported");

    let xml = document_xml(&std::fs::read(&out_path).unwrap());
    assert!(xml.contains("OCR Engine: GROQ"));
    assert!(xml.contains("Original Image (Reference)"));

    println!("Wrote {}", out_path.display());
}

#[tokio::test]
async fn test_groq_strict_mode_keeps_structure() {
    let (path, key) =
        e2e_skip_unless_ready!(Engine::Groq, test_cases_dir().join("chemistry_notes.jpg"));

    let config = ConversionConfig::builder()
        .api_key(key)
        .mode(TranscriptionMode::Strict)
        .api_timeout_secs(120)
        .build()
        .unwrap();

    let result = convert(path.to_str().unwrap(), &config)
        .await
        .expect("conversion should succeed");

    assert_transcription_quality(&result.transcription, &result.blocks, "groq-strict");
    assert!(
        result
            .blocks
            .iter()
            .any(|b| !matches!(b, StructuralBlock::Paragraph { .. })),
        "expected at least one heading, list item or diagram"
    );
}

#[tokio::test]
async fn test_groq_diagram_placeholder() {
    let (path, key) =
        e2e_skip_unless_ready!(Engine::Groq, test_cases_dir().join("chemistry_diagram.png"));

    let result = convert(path.to_str().unwrap(), &config(Engine::Groq, key))
        .await
        .expect("conversion should succeed");

    assert_transcription_quality(&result.transcription, &result.blocks, "groq-diagram");
    assert!(
        result
            .blocks
            .iter()
            .any(|b| matches!(b, StructuralBlock::Diagram { .. })),
        "a drawing should be described as a [DIAGRAM: …] block"
    );
}

#[tokio::test]
async fn test_groq_bad_key_is_auth_failure() {
    let (path, _key) =
        e2e_skip_unless_ready!(Engine::Groq, test_cases_dir().join("chemistry_notes.jpg"));

    let err = convert(
        path.to_str().unwrap(),
        &config(Engine::Groq, "gsk_invalid".to_string()),
    )
    .await
    .expect_err("an invalid key must be rejected");

    assert_eq!(err.class(), notes2docx::ErrorClass::Authentication, "{err}");
}

// ── Gemini ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_gemini_chemistry_notes() {
    let (path, key) =
        e2e_skip_unless_ready!(Engine::Gemini, test_cases_dir().join("chemistry_notes.jpg"));
    let out_path = output_dir().join("chemistry_notes_gemini.docx");

    let result = convert_to_file(
        path.to_str().unwrap(),
        &out_path,
        &config(Engine::Gemini, key),
    )
    .await
    .expect("conversion should succeed");

    assert_transcription_quality(&result.transcription, &result.blocks, "gemini");
    assert!(document_xml(&result.docx).contains("OCR Engine: GEMINI"));
}
