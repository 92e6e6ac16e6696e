use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::services::analysis::types::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

impl DocumentKind {
    /// Content wins over the file name; the extension only decides when the
    /// bytes carry no recognisable signature.
    fn detect(path: &Path, data: &[u8]) -> Result<Self, AnalysisError> {
        if data.starts_with(PDF_MAGIC) {
            return Ok(DocumentKind::Pdf);
        }
        if data.starts_with(ZIP_MAGIC) {
            return Ok(DocumentKind::Docx);
        }
        match mime_guess::from_path(path).first() {
            Some(mime) => match (mime.type_().as_str(), mime.subtype().as_str()) {
                ("application", "pdf") => Ok(DocumentKind::Pdf),
                ("application", "vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                    Ok(DocumentKind::Docx)
                }
                ("text", _) | ("application", "json") => Ok(DocumentKind::PlainText),
                _ => Err(AnalysisError::UnsupportedFormat(mime.essence_str().to_string())),
            },
            None if looks_like_text(data) => Ok(DocumentKind::PlainText),
            None => Err(AnalysisError::UnsupportedFormat(
                mime_guess::mime::APPLICATION_OCTET_STREAM.to_string(),
            )),
        }
    }
}

fn looks_like_text(data: &[u8]) -> bool {
    !data.contains(&0) && std::str::from_utf8(data).is_ok()
}

/// Reads the full text of a PDF, DOCX or plain-text document and truncates it
/// to `max_chars`.
pub async fn read_document_text(path: &Path, max_chars: usize) -> Result<String, AnalysisError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| AnalysisError::ReadDocument {
            path: path.display().to_string(),
            source,
        })?;
    let kind = DocumentKind::detect(path, &data)?;

    info!(
        "[DOC-READER] reading document: path={} kind={:?} bytes={}",
        path.display(),
        kind,
        data.len()
    );

    let text = tokio::task::spawn_blocking(move || extract_text(kind, &data))
        .await
        .map_err(|err| AnalysisError::Extraction {
            kind: "document",
            message: format!("extraction task failed: {err}"),
        })??;

    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyDocument);
    }
    Ok(truncate_chars(text, max_chars))
}

fn extract_text(kind: DocumentKind, data: &[u8]) -> Result<String, AnalysisError> {
    match kind {
        DocumentKind::Pdf => extract_pdf_text(data),
        DocumentKind::Docx => extract_docx_text(data),
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(data).into_owned()),
    }
}

fn extract_pdf_text(data: &[u8]) -> Result<String, AnalysisError> {
    let pdf_error = |message: String| AnalysisError::Extraction {
        kind: "pdf",
        message,
    };
    let doc = lopdf::Document::load_mem(data).map_err(|e| pdf_error(e.to_string()))?;
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        let text = doc
            .extract_text(&[*page_number])
            .map_err(|e| pdf_error(format!("page {page_number}: {e}")))?;
        pages.push(text);
    }
    Ok(pages.join("\n"))
}

fn extract_docx_text(data: &[u8]) -> Result<String, AnalysisError> {
    let docx_error = |message: String| AnalysisError::Extraction {
        kind: "docx",
        message,
    };
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(data)).map_err(|e| docx_error(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| docx_error(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| docx_error(e.to_string()))?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Text(e)) => {
                if let Ok(t) = e.unescape() {
                    out.push_str(&t);
                }
            }
            // paragraph boundary
            Ok(quick_xml::events::Event::End(e)) if e.name().as_ref() == b"w:p" => {
                out.push('\n');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(docx_error(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
