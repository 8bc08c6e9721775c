//! Pipeline integration tests.
//!
//! The hosted endpoints are replaced by `wiremock` servers or by an
//! in-process stub [`VisionModel`]; no test here needs network access or an
//! API key.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use notes2docx::pipeline::encode::EncodedImage;
use notes2docx::{
    convert, convert_from_bytes, convert_image, convert_to_file, ConversionConfig,
    ConversionProgressCallback, DocumentOptions, Engine, ErrorClass, NotesError, SourceImage,
    Stage, StructuralBlock, Transcription, TranscriptionRequest, VisionModel,
};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{any, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipArchive;

// ── Helpers ──────────────────────────────────────────────────────────────────

const NOTES: &str = "# Reactions\nH2 + O2 -> H2O\n- Balance the equation";

fn photo(format: image::ImageFormat, w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([245, 245, 240])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn png(w: u32, h: u32) -> Vec<u8> {
    photo(image::ImageFormat::Png, w, h)
}

fn document_xml(docx: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).expect("docx is a zip archive");
    let mut part = archive.by_name("word/document.xml").expect("document part");
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn expected_blocks() -> Vec<StructuralBlock> {
    vec![
        StructuralBlock::heading(1, "Reactions"),
        StructuralBlock::paragraph("H2 + O2 -> H2O"),
        StructuralBlock::bullet("Balance the equation"),
    ]
}

/// Returns a fixed answer and records what it was sent.
struct StubModel {
    reply: String,
    calls: AtomicUsize,
    last_size: Mutex<Option<(u32, u32)>>,
}

impl StubModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_size: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for StubModel {
    async fn transcribe(
        &self,
        image: &EncodedImage,
        _request: &TranscriptionRequest,
    ) -> Result<Transcription, NotesError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_size.lock().unwrap() = Some((image.width, image.height));
        Ok(Transcription {
            text: self.reply.clone(),
            input_tokens: 100,
            output_tokens: 20,
        })
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-1"
    }
}

fn stub_config(model: Arc<StubModel>) -> ConversionConfig {
    ConversionConfig::builder()
        .vision_model(model)
        .document(DocumentOptions::plain())
        .build()
        .unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start:{stage:?}"));
    }

    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("done:{stage:?}"));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.events.lock().unwrap().push(format!("error:{stage:?}"));
    }

    fn on_conversion_complete(&self, block_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete:{block_count}"));
    }
}

// ── Stub model ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn stub_model_called_exactly_once() {
    let model = StubModel::new(NOTES);
    let out = convert_from_bytes(png(32, 24), "page.png", &stub_config(model.clone()))
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(out.blocks, expected_blocks());
    assert_eq!(out.stats.engine, "stub");
    assert_eq!(out.stats.model, "stub-1");
    assert_eq!(out.stats.block_count, 3);
    assert_eq!((out.stats.input_tokens, out.stats.output_tokens), (100, 20));
}

#[tokio::test]
async fn document_follows_block_order() {
    let out = convert_from_bytes(png(8, 8), "page.png", &stub_config(StubModel::new(NOTES)))
        .await
        .unwrap();
    let xml = document_xml(&out.docx);

    let heading = xml.find(r#"w:val="Heading1""#).unwrap();
    let reactions = xml.find("Reactions").unwrap();
    let body = xml.find("H2 + O2 -&gt; H2O").unwrap();
    let bullet = xml.find(r#"w:val="ListBullet""#).unwrap();
    let balance = xml.find("Balance the equation").unwrap();
    assert!(heading < reactions && reactions < body && body < bullet && bullet < balance);
}

#[tokio::test]
async fn decorated_document_by_default() {
    let model = StubModel::new(NOTES);
    let config = ConversionConfig::builder()
        .vision_model(model)
        .build()
        .unwrap();
    let out = convert_from_bytes(photo(image::ImageFormat::Jpeg, 60, 30), "page.jpg", &config)
        .await
        .unwrap();

    let xml = document_xml(&out.docx);
    assert!(xml.contains("Chemistry Notes - OCR Extraction"));
    assert!(xml.contains("OCR Engine: STUB"));
    assert!(xml.contains("Original Image (Reference)"));
    assert!(xml.contains("<w:drawing>"));

    let mut archive = ZipArchive::new(Cursor::new(&out.docx[..])).unwrap();
    assert!(archive.by_name("word/media/image1.jpeg").is_ok());
}

#[tokio::test]
async fn model_artefacts_are_cleaned_before_mapping() {
    let reply = "```markdown\r\n# Reactions\r\nH2 + O2 -> H2O\r\n- Balance the equation\r\n```";
    let out = convert_from_bytes(png(8, 8), "page.png", &stub_config(StubModel::new(reply)))
        .await
        .unwrap();
    assert_eq!(out.blocks, expected_blocks());
    assert_eq!(out.transcription, NOTES);
}

#[tokio::test]
async fn image_link_becomes_diagram_block() {
    let reply = "## Cells\n![Galvanic cell with salt bridge](cell.png)";
    let out = convert_from_bytes(png(8, 8), "page.png", &stub_config(StubModel::new(reply)))
        .await
        .unwrap();
    assert_eq!(
        out.blocks,
        vec![
            StructuralBlock::heading(2, "Cells"),
            StructuralBlock::diagram("[DIAGRAM: Galvanic cell with salt bridge]"),
        ]
    );
}

#[tokio::test]
async fn blank_answer_is_empty_response() {
    let model = StubModel::new(" \n\u{200B}\n ");
    let err = convert_from_bytes(png(8, 8), "page.png", &stub_config(model))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::EmptyResponse, "{err}");
}

#[tokio::test]
async fn oversized_photo_is_downscaled_before_sending() {
    let model = StubModel::new(NOTES);
    let config = ConversionConfig::builder()
        .vision_model(model.clone())
        .max_dimension(500)
        .document(DocumentOptions::plain())
        .build()
        .unwrap();

    let out = convert_from_bytes(png(1500, 750), "big.png", &config)
        .await
        .unwrap();

    assert_eq!(*model.last_size.lock().unwrap(), Some((500, 250)));
    assert_eq!((out.stats.image_width, out.stats.image_height), (1500, 750));
    assert_eq!((out.stats.sent_width, out.stats.sent_height), (500, 250));
}

#[tokio::test]
async fn progress_events_follow_stage_order() {
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .vision_model(StubModel::new(NOTES))
        .document(DocumentOptions::plain())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let source = SourceImage::from_bytes(png(8, 8), "page.png").unwrap();
    convert_image(source, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start:Encode",
            "done:Encode",
            "start:Transcribe",
            "done:Transcribe",
            "start:Map",
            "done:Map",
            "start:Build",
            "done:Build",
            "complete:3",
        ]
    );
}

#[tokio::test]
async fn intake_error_is_reported_and_model_not_called() {
    let recorder = Arc::new(Recorder::default());
    let model = StubModel::new(NOTES);
    let config = ConversionConfig::builder()
        .vision_model(model.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = convert("/definitely/not/here/page.jpg", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, NotesError::FileNotFound { .. }), "{err}");
    assert_eq!(model.calls(), 0);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start:Intake", "error:Intake"]
    );
}

#[tokio::test]
async fn non_image_bytes_rejected() {
    let model = StubModel::new(NOTES);
    let err = convert_from_bytes(b"%PDF-1.7".to_vec(), "notes.pdf", &stub_config(model.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Input);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn convert_to_file_writes_complete_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.png");
    std::fs::write(&input, png(16, 16)).unwrap();
    let output = dir.path().join("out").join("notes.docx");

    let out = convert_to_file(
        input.to_str().unwrap(),
        &output,
        &stub_config(StubModel::new(NOTES)),
    )
    .await
    .unwrap();

    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, out.docx);
    assert!(document_xml(&written).contains("Balance the equation"));
    assert!(!output.with_extension("docx.tmp").exists());
}

#[tokio::test]
async fn failed_conversion_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.png");
    std::fs::write(&input, png(16, 16)).unwrap();
    let output = dir.path().join("notes.docx");

    let err = convert_to_file(
        input.to_str().unwrap(),
        &output,
        &stub_config(StubModel::new("   ")),
    )
    .await
    .unwrap_err();

    assert_eq!(err.class(), ErrorClass::EmptyResponse);
    assert!(!output.exists());
}

// ── Groq over HTTP ───────────────────────────────────────────────────────────

fn groq_config(server: &MockServer) -> ConversionConfig {
    ConversionConfig::builder()
        .engine(Engine::Groq)
        .api_key("gsk_test")
        .base_url(server.uri())
        .document(DocumentOptions::plain())
        .build()
        .unwrap()
}

#[tokio::test]
async fn groq_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk_test"))
        .and(body_partial_json(serde_json::json!({
            "model": "meta-llama/llama-4-maverick-17b-128e-instruct",
            "max_completion_tokens": 4096,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": NOTES}}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 31}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap();

    assert_eq!(out.blocks, expected_blocks());
    assert_eq!(out.stats.engine, "groq");
    assert_eq!((out.stats.input_tokens, out.stats.output_tokens), (812, 31));
}

#[tokio::test]
async fn groq_request_carries_image_data_uri() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .mount(&server)
        .await;

    convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    let url = body["messages"][1]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap();
    assert!(url.starts_with("data:image/png;base64,"), "{url}");
}

#[tokio::test]
async fn groq_unauthorized_is_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Invalid API Key", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Authentication);
    assert!(err.to_string().contains("Invalid API Key"), "{err}");
}

#[tokio::test]
async fn groq_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
        .expect(1)
        .mount(&server)
        .await;

    let err = convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            NotesError::RateLimited {
                retry_after_secs: Some(5),
                ..
            }
        ),
        "{err}"
    );
}

#[tokio::test]
async fn groq_server_error_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .expect(1)
        .mount(&server)
        .await;

    let err = convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, NotesError::ApiError { status: 503, .. }), "{err}");
}

#[tokio::test]
async fn groq_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = convert_from_bytes(png(10, 10), "page.png", &groq_config(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, NotesError::InvalidResponse { .. }), "{err}");
}

#[tokio::test]
async fn groq_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(5))
                .set_body_json(serde_json::json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let config = ConversionConfig::builder()
        .api_key("gsk_test")
        .base_url(server.uri())
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let err = convert_from_bytes(png(10, 10), "page.png", &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, NotesError::RequestTimeout { secs: 1, .. }),
        "{err}"
    );
}

// ── Gemini over HTTP ─────────────────────────────────────────────────────────

#[tokio::test]
async fn gemini_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "AIza_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": NOTES}]}}],
            "usageMetadata": {"promptTokenCount": 300, "candidatesTokenCount": 25}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConversionConfig::builder()
        .engine(Engine::Gemini)
        .api_key("AIza_test")
        .base_url(server.uri())
        .build()
        .unwrap();

    let out = convert_from_bytes(png(10, 10), "page.png", &config)
        .await
        .unwrap();

    assert_eq!(out.blocks, expected_blocks());
    assert_eq!(out.stats.engine, "gemini");
    assert!(document_xml(&out.docx).contains("OCR Engine: GEMINI"));
}

#[tokio::test]
async fn gemini_invalid_key_is_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{"reason": "API_KEY_INVALID"}]
            }
        })))
        .mount(&server)
        .await;

    let config = ConversionConfig::builder()
        .engine(Engine::Gemini)
        .api_key("bad")
        .base_url(server.uri())
        .build()
        .unwrap();

    let err = convert_from_bytes(png(10, 10), "page.png", &config)
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authentication, "{err}");
}

// ── Credentials and URL inputs ───────────────────────────────────────────────

#[tokio::test]
async fn missing_credential_makes_no_requests() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ConversionConfig::builder()
        .engine(Engine::Groq)
        .base_url(server.uri())
        .build()
        .unwrap();

    // A URL input would be downloaded from the same server.
    let err = convert(format!("{}/page.png", server.uri()), &config)
        .await
        .unwrap_err();

    match &err {
        NotesError::MissingCredential { engine, env_var } => {
            assert_eq!(engine, "groq");
            assert_eq!(env_var, "GROQ_API_KEY");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_api_key_counts_as_missing() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ConversionConfig::builder()
        .engine(Engine::Groq)
        .api_key("   ")
        .base_url(server.uri())
        .build()
        .unwrap();

    let err = convert_from_bytes(png(64, 64), "page.png", &config)
        .await
        .unwrap_err();

    assert!(
        matches!(err, NotesError::MissingCredential { .. }),
        "unexpected error: {err}"
    );
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn url_input_is_downloaded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/uploads/page.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png(12, 9)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let model = StubModel::new(NOTES);
    let out = convert(
        format!("{}/uploads/page.png", server.uri()),
        &stub_config(model.clone()),
    )
    .await
    .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!((out.stats.image_width, out.stats.image_height), (12, 9));
}

#[tokio::test]
async fn url_not_found_is_download_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let model = StubModel::new(NOTES);
    let err = convert(
        format!("{}/missing.png", server.uri()),
        &stub_config(model.clone()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, NotesError::DownloadFailed { .. }), "{err}");
    assert_eq!(model.calls(), 0);
}
