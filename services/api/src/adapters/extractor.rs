//! services/api/src/adapters/extractor.rs
//!
//! This module contains the adapter that pulls plain text out of uploaded
//! documents. It implements the `TextExtractionService` port from the `core` crate.
//!
//! PDF text comes from `pdf-extract`. A DOCX file is a ZIP archive whose body
//! lives in `word/document.xml`; its text runs are read with `quick-xml`.

use async_trait::async_trait;
use lesson_plan_core::{
    domain::DocumentKind,
    ports::{PortError, PortResult, TextExtractionService},
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextExtractionService` for PDF and DOCX files.
#[derive(Clone, Default)]
pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    /// Creates a new `DocumentTextExtractor`.
    pub fn new() -> Self {
        Self
    }
}

//=========================================================================================
// `TextExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextExtractionService for DocumentTextExtractor {
    async fn extract_text(&self, path: &Path, mime_type: &str) -> PortResult<String> {
        // The type is checked before the file is opened.
        let kind = DocumentKind::from_mime_type(mime_type)
            .ok_or_else(|| PortError::UnsupportedType(mime_type.to_string()))?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PortError::Unexpected(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Extracting text from {} ({} bytes)", path.display(), bytes.len());

        // Both parsers are CPU-bound; a panic inside them surfaces as a JoinError.
        tokio::task::spawn_blocking(move || match kind {
            DocumentKind::Pdf => extract_pdf_text(&bytes),
            DocumentKind::Docx => extract_docx_text(&bytes),
        })
        .await
        .map_err(|e| PortError::Unexpected(format!("Text extraction task failed: {}", e)))?
    }
}

//=========================================================================================
// Format-specific Helpers
//=========================================================================================

fn extract_pdf_text(bytes: &[u8]) -> PortResult<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PortError::Unexpected(format!("Failed to extract text from PDF: {}", e)))
}

pub(crate) fn extract_docx_text(bytes: &[u8]) -> PortResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PortError::Unexpected(format!("Failed to open DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| PortError::Unexpected(format!("DOCX has no document body: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| PortError::Unexpected(format!("Failed to read document.xml: {}", e)))?;

    docx_body_text(&xml)
}

/// Collects the visible text of a WordprocessingML body.
fn docx_body_text(xml: &str) -> PortResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_run = false;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text_run = true,
                _ => {}
            },
            // Tab stops in paragraph properties are also `w:tab`; only run-level ones count.
            Ok(Event::Empty(e)) if in_run => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| PortError::Unexpected(format!("Invalid DOCX text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PortError::Unexpected(format!(
                    "Malformed document.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_plan_core::domain::{DOCX_MIME_TYPE, PDF_MIME_TYPE};
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Builds a minimal DOCX archive around the given `<w:body>` content.
    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_tabs_and_breaks_are_kept() {
        let bytes = docx_with_body(
            "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr><w:r><w:t>Plano de Aula</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Tempo: </w:t></w:r><w:r><w:tab/><w:t>50 min</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Linha 1</w:t><w:br/><w:t>Linha 2 &amp; 3</w:t></w:r></w:p>",
        );

        let text = extract_docx_text(&bytes).unwrap();
        assert_eq!(text, "Plano de Aula\nTempo: \t50 min\nLinha 1\nLinha 2 & 3\n");
    }

    #[test]
    fn docx_without_body_part_is_an_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(extract_docx_text(&bytes), Err(PortError::Unexpected(_))));
    }

    #[test]
    fn non_zip_bytes_are_not_a_docx() {
        assert!(extract_docx_text(b"%PDF-1.5 definitely not a zip").is_err());
    }

    #[tokio::test]
    async fn unsupported_type_fails_before_reading() {
        let extractor = DocumentTextExtractor::new();
        // The path does not exist, so any read attempt would produce an I/O error instead.
        let missing = Path::new("/nonexistent/lesson-plan.txt");

        let err = extractor.extract_text(missing, "text/plain").await.unwrap_err();
        assert!(matches!(err, PortError::UnsupportedType(ref t) if t == "text/plain"));
    }

    #[tokio::test]
    async fn docx_file_on_disk_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plano.docx");
        std::fs::write(&path, docx_with_body("<w:p><w:r><w:t>Olá, turma</w:t></w:r></w:p>")).unwrap();

        let text = DocumentTextExtractor::new()
            .extract_text(&path, DOCX_MIME_TYPE)
            .await
            .unwrap();
        assert_eq!(text, "Olá, turma\n");
    }

    #[tokio::test]
    async fn missing_supported_file_is_unexpected_error() {
        let err = DocumentTextExtractor::new()
            .extract_text(Path::new("/nonexistent/plano.pdf"), PDF_MIME_TYPE)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
