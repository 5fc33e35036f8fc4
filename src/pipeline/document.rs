//! Document assembly: one paragraph per recognised line.
//!
//! Writers build the whole document in memory and write it in one go on
//! [`DocumentBuilder::save`]. The bytes go to a sibling temp file which is
//! renamed over the destination, so an existing document is replaced
//! atomically and a failed save never leaves a half-written file behind.
//!
//! ## `.docx` layout
//!
//! ```text
//! [Content_Types].xml   part → content type map
//! _rels/.rels           package → word/document.xml
//! word/document.xml     <w:p> per line
//! ```
//!
//! Entries carry a fixed timestamp, so the same lines always produce the
//! same bytes.

use crate::config::OutputFormat;
use crate::error::ConversionError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Creates empty documents of one format.
pub trait DocumentWriter: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn create(&self) -> Box<dyn DocumentBuilder>;
}

/// A document under construction.
pub trait DocumentBuilder {
    fn add_paragraph(&mut self, text: &str);

    fn paragraph_count(&self) -> usize;

    /// Serialise and write to `path`, replacing any existing file.
    fn save(self: Box<Self>, path: &Path) -> Result<(), ConversionError>;
}

/// The built-in writer for `format`.
pub fn writer_for(format: OutputFormat) -> Box<dyn DocumentWriter> {
    match format {
        OutputFormat::Docx => Box::new(DocxWriter),
        OutputFormat::Text => Box::new(TextWriter),
    }
}

// ── .docx ────────────────────────────────────────────────────────────────

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

/// Office Open XML word-processing documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxWriter;

impl DocumentWriter for DocxWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn create(&self) -> Box<dyn DocumentBuilder> {
        Box::new(DocxBuilder::default())
    }
}

#[derive(Default)]
struct DocxBuilder {
    body: String,
    paragraphs: usize,
}

impl DocumentBuilder for DocxBuilder {
    fn add_paragraph(&mut self, text: &str) {
        if text.is_empty() {
            self.body.push_str("<w:p/>");
        } else {
            self.body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            push_escaped(&mut self.body, text);
            self.body.push_str("</w:t></w:r></w:p>");
        }
        self.paragraphs += 1;
    }

    fn paragraph_count(&self) -> usize {
        self.paragraphs
    }

    fn save(self: Box<Self>, path: &Path) -> Result<(), ConversionError> {
        let document = format!("{DOCUMENT_HEAD}{}{DOCUMENT_TAIL}", self.body);
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/document.xml", document.as_str()),
        ];
        debug!("Writing {} paragraphs to {}", self.paragraphs, path.display());
        write_atomically(path, |file| {
            let mut zip = ZipWriter::new(file);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(DateTime::default());
            for (name, content) in parts {
                zip.start_file(name, options)?;
                zip.write_all(content.as_bytes())?;
            }
            zip.finish()?;
            Ok(())
        })
    }
}

/// XML-escape `text`, dropping characters XML 1.0 cannot carry.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push('\t'),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
}

// ── plain text ───────────────────────────────────────────────────────────

/// UTF-8 text, one line per paragraph.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextWriter;

impl DocumentWriter for TextWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn create(&self) -> Box<dyn DocumentBuilder> {
        Box::new(TextBuilder::default())
    }
}

#[derive(Default)]
struct TextBuilder {
    lines: Vec<String>,
}

impl DocumentBuilder for TextBuilder {
    fn add_paragraph(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn paragraph_count(&self) -> usize {
        self.lines.len()
    }

    fn save(self: Box<Self>, path: &Path) -> Result<(), ConversionError> {
        write_atomically(path, |file| {
            let mut out = io::BufWriter::new(file);
            for line in &self.lines {
                writeln!(out, "{line}")?;
            }
            out.flush()
        })
    }
}

// ── Atomic save ──────────────────────────────────────────────────────────

fn write_atomically<F>(path: &Path, write: F) -> Result<(), ConversionError>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let save_failed = |source: io::Error| ConversionError::DocumentSaveFailed {
        path: path.to_path_buf(),
        source,
    };

    let tmp = temp_path(path);
    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(save_failed(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn document_xml(path: &Path) -> String {
        let file = fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn docx_has_one_paragraph_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");

        let mut doc = DocxWriter.create();
        doc.add_paragraph("First line");
        doc.add_paragraph("");
        doc.add_paragraph("Fish & <Chips>");
        assert_eq!(doc.paragraph_count(), 3);
        doc.save(&path).unwrap();

        let xml = document_xml(&path);
        assert_eq!(xml.matches("<w:p>").count() + xml.matches("<w:p/>").count(), 3);
        assert!(xml.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(!dir.path().join("doc.docx.partial").exists());
    }

    #[test]
    fn docx_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str| {
            let path = dir.path().join(name);
            let mut doc = DocxWriter.create();
            doc.add_paragraph("same text");
            doc.save(&path).unwrap();
            fs::read(path).unwrap()
        };
        assert_eq!(write("a.docx"), write("b.docx"));
    }

    #[test]
    fn control_characters_are_dropped() {
        let mut out = String::new();
        push_escaped(&mut out, "a\u{c}b\tc\u{1}");
        assert_eq!(out, "ab\tc");
    }

    #[test]
    fn text_writer_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "stale content that is longer\n").unwrap();

        let mut doc = TextWriter.create();
        doc.add_paragraph("one");
        doc.add_paragraph("two");
        doc.save(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("doc.docx");
        let err = DocxWriter.create().save(&path).unwrap_err();
        assert!(
            matches!(err, ConversionError::DocumentSaveFailed { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn writer_for_matches_format() {
        assert_eq!(writer_for(OutputFormat::Docx).format(), OutputFormat::Docx);
        assert_eq!(writer_for(OutputFormat::Text).format(), OutputFormat::Text);
    }
}
