use crate::error::IngestError;
use crate::models::SourceDocument;
use lopdf::Document;
use regex::Regex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Returns every page in page order. Pages without extractable text are
    /// kept with empty text; only a malformed document is an error.
    fn extract_pages(&self, document: &SourceDocument) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, source: &SourceDocument) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(&source.bytes).map_err(|error| {
            IngestError::PdfParse(format!("{}: {error}", source.name))
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(document = %source.name, page = page_no, %error, "page has no extractable text");
                    String::new()
                }
            };

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenates the text of all pages of all documents, in input order,
/// without inserting separators. Page text keeps the line ending lopdf ends
/// each page with, except after the very last page.
pub fn extract_text(documents: &[SourceDocument]) -> Result<String, IngestError> {
    extract_text_with(&LopdfExtractor, documents)
}

pub fn extract_text_with<X>(extractor: &X, documents: &[SourceDocument]) -> Result<String, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let line_breaks = Regex::new(r"\r\n?")?;
    let mut text = String::new();

    for document in documents {
        let pages = extractor.extract_pages(document)?;
        let empty_pages = pages.iter().filter(|page| page.text.trim().is_empty()).count();
        if empty_pages > 0 {
            warn!(
                document = %document.name,
                empty_pages,
                total_pages = pages.len(),
                "some pages yielded no text"
            );
        }

        let before = text.len();
        for page in pages {
            text.push_str(&normalize_page_text(&line_breaks, &page.text));
        }

        debug!(
            document = %document.name,
            checksum = %document.checksum,
            bytes = text.len() - before,
            "document text extracted"
        );
    }

    if text.ends_with('\n') {
        text.pop();
    }

    Ok(text)
}

fn normalize_page_text(line_breaks: &Regex, text: &str) -> String {
    line_breaks
        .replace_all(text, "\n")
        .replace('\u{a0}', " ")
        .replace('\0', "")
}
