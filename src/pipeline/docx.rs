//! Document builder: [`StructuralBlock`]s → `.docx` bytes.
//!
//! The package is written from scratch with `zip` and `quick-xml`; no
//! template file is needed. Parts:
//!
//! | Part | Content |
//! |------|---------|
//! | `[Content_Types].xml` | MIME types of all parts |
//! | `_rels/.rels` | points at `word/document.xml` |
//! | `word/document.xml` | the body, one `<w:p>` per block |
//! | `word/styles.xml` | Normal, Heading1–6, ListBullet, ListNumber, IntenseQuote |
//! | `word/numbering.xml` | bullet list + one decimal list per numbered run |
//! | `word/_rels/document.xml.rels` | styles, numbering, optional image |
//! | `word/media/image1.{png,jpeg}` | optional reference photo |
//!
//! Block text is written verbatim (XML-escaped); characters XML 1.0 cannot
//! carry are dropped.

use super::input::{ImageFormat, SourceImage};
use super::mapper::StructuralBlock;
use crate::error::NotesError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the produced artifact.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Width of the embedded reference photo: 6 inches in EMU.
const REFERENCE_WIDTH_EMU: u64 = 6 * 914_400;

const SEPARATOR: &str = "__________________________________________________";
const REFERENCE_HEADING: &str = "Original Image (Reference)";
const REFERENCE_UNAVAILABLE: &str = "[Could not embed original image]";
const IMAGE_REL_ID: &str = "rId3";

/// `numId` of the shared bullet list; numbered runs start after it.
const BULLET_NUM_ID: u32 = 1;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

#[derive(Debug, Clone)]
enum Reference {
    Image {
        bytes: Vec<u8>,
        format: ImageFormat,
        width: u32,
        height: u32,
    },
    Unavailable,
}

/// Assembles a Word document around a block sequence.
///
/// A bare builder emits the blocks only. The decorations are opt-in:
///
/// ```rust
/// use notes2docx::{DocxBuilder, StructuralBlock};
///
/// let bytes = DocxBuilder::new()
///     .title("Chemistry Notes - OCR Extraction")
///     .engine_line("groq")
///     .build(&[StructuralBlock::heading(1, "Acids")])
///     .unwrap();
/// assert_eq!(&bytes[..2], b"PK");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    title: Option<String>,
    engine: Option<String>,
    reference: Option<Reference>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Centred level-1 heading at the top.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// "OCR Engine: NAME" line under the title.
    pub fn engine_line(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_uppercase());
        self
    }

    /// Append the photo under an "Original Image (Reference)" heading,
    /// 6 inches wide.
    pub fn reference_image(mut self, image: &SourceImage) -> Self {
        self.reference = Some(if image.width() == 0 || image.height() == 0 {
            Reference::Unavailable
        } else {
            Reference::Image {
                bytes: image.bytes().to_vec(),
                format: image.format(),
                width: image.width(),
                height: image.height(),
            }
        });
        self
    }

    /// Serialise the package.
    ///
    /// # Errors
    /// [`NotesError::DocumentBuild`] if writing the XML or the archive fails.
    pub fn build(&self, blocks: &[StructuralBlock]) -> Result<Vec<u8>, NotesError> {
        let (document, numbered_runs) = self.render_document(blocks)?;
        let numbering = render_numbering(numbered_runs)?;
        let image = match &self.reference {
            Some(Reference::Image { bytes, format, .. }) => Some((bytes.as_slice(), *format)),
            _ => None,
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut add = |name: &str, data: &[u8]| -> Result<(), NotesError> {
            zip.start_file(name, options).map_err(build_err)?;
            zip.write_all(data).map_err(build_err)
        };

        add(
            "[Content_Types].xml",
            content_types(image.map(|(_, f)| f)).as_bytes(),
        )?;
        add("_rels/.rels", PACKAGE_RELS.as_bytes())?;
        add("word/document.xml", &document)?;
        add("word/styles.xml", STYLES.as_bytes())?;
        add("word/numbering.xml", &numbering)?;
        add(
            "word/_rels/document.xml.rels",
            document_rels(image.map(|(_, f)| f)).as_bytes(),
        )?;
        if let Some((bytes, format)) = image {
            add(&format!("word/media/image1.{}", format.extension()), bytes)?;
        }

        let bytes = zip.finish().map_err(build_err)?.into_inner();
        debug!(
            "Built docx: {} blocks, {} numbered runs, {} bytes",
            blocks.len(),
            numbered_runs,
            bytes.len()
        );
        Ok(bytes)
    }

    /// `word/document.xml` plus the number of numbered-list runs it uses.
    fn render_document(&self, blocks: &[StructuralBlock]) -> Result<(Vec<u8>, u32), NotesError> {
        let mut body = Body::new()?;

        if let Some(title) = &self.title {
            body.paragraph(
                Para::styled("Heading1").centred(),
                title,
            )?;
        }
        if let Some(engine) = &self.engine {
            body.paragraph(Para::plain(), &format!("OCR Engine: {engine}"))?;
        }
        if self.title.is_some() || self.engine.is_some() {
            body.paragraph(Para::plain(), SEPARATOR)?;
        }

        let mut numbered_runs = 0u32;
        let mut in_numbered_run = false;
        for block in blocks {
            let ordered = matches!(block, StructuralBlock::BulletItem { ordered: true, .. });
            if ordered && !in_numbered_run {
                numbered_runs += 1;
            }
            in_numbered_run = ordered;

            match block {
                StructuralBlock::Heading { level, text } => {
                    let style = format!("Heading{}", (*level).clamp(1, 6));
                    body.paragraph(Para::styled(&style), text)?;
                }
                StructuralBlock::Paragraph { text } => body.paragraph(Para::plain(), text)?,
                StructuralBlock::BulletItem {
                    text,
                    ordered: false,
                } => body.paragraph(Para::styled("ListBullet").numbered(BULLET_NUM_ID), text)?,
                StructuralBlock::BulletItem {
                    text,
                    ordered: true,
                } => body.paragraph(
                    Para::styled("ListNumber").numbered(BULLET_NUM_ID + numbered_runs),
                    text,
                )?,
                StructuralBlock::Diagram { text } => {
                    body.paragraph(Para::styled("IntenseQuote"), text)?
                }
            }
        }

        if let Some(reference) = &self.reference {
            body.paragraph(Para::plain(), "")?;
            body.paragraph(Para::plain(), SEPARATOR)?;
            body.paragraph(Para::styled("Heading2"), REFERENCE_HEADING)?;
            match reference {
                Reference::Image {
                    format,
                    width,
                    height,
                    ..
                } => body.picture(*format, *width, *height)?,
                Reference::Unavailable => body.paragraph(Para::plain(), REFERENCE_UNAVAILABLE)?,
            }
        }

        if body.paragraphs == 0 {
            body.paragraph(Para::plain(), "")?;
        }

        Ok((body.finish()?, numbered_runs))
    }
}

fn build_err(e: impl std::fmt::Display) -> NotesError {
    NotesError::DocumentBuild(e.to_string())
}

/// Drop characters XML 1.0 cannot represent.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect()
}

// ── XML writing ──────────────────────────────────────────────────────────────

struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Result<Self, NotesError> {
        let mut xml = Self {
            writer: Writer::new(Vec::new()),
        };
        xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(xml)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), NotesError> {
        self.writer.write_event(event).map_err(build_err)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), NotesError> {
        self.event(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), NotesError> {
        self.event(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn end(&mut self, name: &str) -> Result<(), NotesError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<(), NotesError> {
        self.event(Event::Text(BytesText::new(text)))
    }

    fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Paragraph properties.
struct Para<'a> {
    style: Option<&'a str>,
    num_id: Option<u32>,
    centred: bool,
}

impl<'a> Para<'a> {
    fn plain() -> Self {
        Self {
            style: None,
            num_id: None,
            centred: false,
        }
    }

    fn styled(style: &'a str) -> Self {
        Self {
            style: Some(style),
            ..Self::plain()
        }
    }

    fn numbered(mut self, num_id: u32) -> Self {
        self.num_id = Some(num_id);
        self
    }

    fn centred(mut self) -> Self {
        self.centred = true;
        self
    }
}

/// `word/document.xml` under construction.
struct Body {
    xml: Xml,
    paragraphs: usize,
    pictures: u32,
}

impl Body {
    fn new() -> Result<Self, NotesError> {
        let mut xml = Xml::new()?;
        xml.start(
            "w:document",
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        )?;
        xml.start("w:body", &[])?;
        Ok(Self {
            xml,
            paragraphs: 0,
            pictures: 0,
        })
    }

    fn paragraph(&mut self, props: Para<'_>, text: &str) -> Result<(), NotesError> {
        let x = &mut self.xml;
        x.start("w:p", &[])?;

        if props.style.is_some() || props.num_id.is_some() || props.centred {
            x.start("w:pPr", &[])?;
            if let Some(style) = props.style {
                x.empty("w:pStyle", &[("w:val", style)])?;
            }
            if let Some(num_id) = props.num_id {
                x.start("w:numPr", &[])?;
                x.empty("w:ilvl", &[("w:val", "0")])?;
                x.empty("w:numId", &[("w:val", &num_id.to_string())])?;
                x.end("w:numPr")?;
            }
            if props.centred {
                x.empty("w:jc", &[("w:val", "center")])?;
            }
            x.end("w:pPr")?;
        }

        let text = xml_safe(text);
        if !text.is_empty() {
            x.start("w:r", &[])?;
            x.start("w:t", &[("xml:space", "preserve")])?;
            x.text(&text)?;
            x.end("w:t")?;
            x.end("w:r")?;
        }

        x.end("w:p")?;
        self.paragraphs += 1;
        Ok(())
    }

    /// Inline picture scaled to 6 inches wide.
    fn picture(&mut self, format: ImageFormat, width: u32, height: u32) -> Result<(), NotesError> {
        self.pictures += 1;
        let id = self.pictures.to_string();
        let name = format!("image{}.{}", self.pictures, format.extension());
        let cx = REFERENCE_WIDTH_EMU.to_string();
        let cy = (REFERENCE_WIDTH_EMU * height as u64 / width as u64).to_string();

        let x = &mut self.xml;
        x.start("w:p", &[])?;
        x.start("w:r", &[])?;
        x.start("w:drawing", &[])?;
        x.start(
            "wp:inline",
            &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        )?;
        x.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
        x.empty("wp:docPr", &[("id", &id), ("name", &name)])?;
        x.start("a:graphic", &[])?;
        x.start("a:graphicData", &[("uri", NS_PIC)])?;
        x.start("pic:pic", &[])?;

        x.start("pic:nvPicPr", &[])?;
        x.empty("pic:cNvPr", &[("id", &id), ("name", &name)])?;
        x.empty("pic:cNvPicPr", &[])?;
        x.end("pic:nvPicPr")?;

        x.start("pic:blipFill", &[])?;
        x.empty("a:blip", &[("r:embed", IMAGE_REL_ID)])?;
        x.start("a:stretch", &[])?;
        x.empty("a:fillRect", &[])?;
        x.end("a:stretch")?;
        x.end("pic:blipFill")?;

        x.start("pic:spPr", &[])?;
        x.start("a:xfrm", &[])?;
        x.empty("a:off", &[("x", "0"), ("y", "0")])?;
        x.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        x.end("a:xfrm")?;
        x.start("a:prstGeom", &[("prst", "rect")])?;
        x.empty("a:avLst", &[])?;
        x.end("a:prstGeom")?;
        x.end("pic:spPr")?;

        x.end("pic:pic")?;
        x.end("a:graphicData")?;
        x.end("a:graphic")?;
        x.end("wp:inline")?;
        x.end("w:drawing")?;
        x.end("w:r")?;
        x.end("w:p")?;

        self.paragraphs += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, NotesError> {
        let x = &mut self.xml;
        // US Letter, 1-inch margins: 6.5 inches of text width.
        x.start("w:sectPr", &[])?;
        x.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
        x.empty(
            "w:pgMar",
            &[
                ("w:top", "1440"),
                ("w:right", "1440"),
                ("w:bottom", "1440"),
                ("w:left", "1440"),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        )?;
        x.end("w:sectPr")?;
        x.end("w:body")?;
        x.end("w:document")?;
        Ok(self.xml.into_inner())
    }
}

/// `word/numbering.xml`: abstract list 0 is the bullet, 1 is decimal.
/// `numId` 1 is the bullet list; every numbered run gets its own `numId`
/// (2, 3, …) restarting at 1.
fn render_numbering(numbered_runs: u32) -> Result<Vec<u8>, NotesError> {
    let mut x = Xml::new()?;
    x.start("w:numbering", &[("xmlns:w", NS_W)])?;

    for (abstract_id, fmt, lvl_text) in [("0", "bullet", "\u{2022}"), ("1", "decimal", "%1.")] {
        x.start("w:abstractNum", &[("w:abstractNumId", abstract_id)])?;
        x.empty("w:multiLevelType", &[("w:val", "singleLevel")])?;
        x.start("w:lvl", &[("w:ilvl", "0")])?;
        x.empty("w:start", &[("w:val", "1")])?;
        x.empty("w:numFmt", &[("w:val", fmt)])?;
        x.empty("w:lvlText", &[("w:val", lvl_text)])?;
        x.empty("w:lvlJc", &[("w:val", "left")])?;
        x.start("w:pPr", &[])?;
        x.empty("w:ind", &[("w:left", "720"), ("w:hanging", "360")])?;
        x.end("w:pPr")?;
        x.end("w:lvl")?;
        x.end("w:abstractNum")?;
    }

    let bullet_id = BULLET_NUM_ID.to_string();
    x.start("w:num", &[("w:numId", &bullet_id)])?;
    x.empty("w:abstractNumId", &[("w:val", "0")])?;
    x.end("w:num")?;

    for run in 1..=numbered_runs {
        let num_id = (BULLET_NUM_ID + run).to_string();
        x.start("w:num", &[("w:numId", &num_id)])?;
        x.empty("w:abstractNumId", &[("w:val", "1")])?;
        x.start("w:lvlOverride", &[("w:ilvl", "0")])?;
        x.empty("w:startOverride", &[("w:val", "1")])?;
        x.end("w:lvlOverride")?;
        x.end("w:num")?;
    }

    x.end("w:numbering")?;
    Ok(x.into_inner())
}

// ── Static parts ─────────────────────────────────────────────────────────────

fn content_types(image: Option<ImageFormat>) -> String {
    let image_default = image
        .map(|f| {
            format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                f.extension(),
                f.mime_type()
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{image_default}<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#
    )
}

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_rels(image: Option<ImageFormat>) -> String {
    let image_rel = image
        .map(|f| {
            format!(
                r#"<Relationship Id="{IMAGE_REL_ID}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.{}"/>"#,
                f.extension()
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>{image_rel}</Relationships>"#
    )
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="Calibri" w:cs="Calibri"/><w:sz w:val="22"/><w:szCs w:val="22"/><w:lang w:val="en-US"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="480" w:after="0"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:color w:val="365F91"/><w:sz w:val="28"/><w:szCs w:val="28"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="0"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:color w:val="4F81BD"/><w:sz w:val="26"/><w:szCs w:val="26"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="0"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:color w:val="4F81BD"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading4"><w:name w:val="heading 4"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="0"/><w:outlineLvl w:val="3"/></w:pPr><w:rPr><w:b/><w:i/><w:color w:val="4F81BD"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading5"><w:name w:val="heading 5"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="0"/><w:outlineLvl w:val="4"/></w:pPr><w:rPr><w:color w:val="243F60"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading6"><w:name w:val="heading 6"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="0"/><w:outlineLvl w:val="5"/></w:pPr><w:rPr><w:i/><w:color w:val="243F60"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="60"/><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="ListNumber"><w:name w:val="List Number"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="60"/><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="IntenseQuote"><w:name w:val="Intense Quote"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="4" w:space="4" w:color="4F81BD"/></w:pBdr><w:spacing w:before="200" w:after="280"/><w:ind w:left="936" w:right="936"/></w:pPr><w:rPr><w:b/><w:i/><w:color w:val="4F81BD"/></w:rPr></w:style>
</w:styles>"#;
