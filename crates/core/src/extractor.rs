use crate::error::IngestError;
use lopdf::Document;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Outcome of reading a well-formed PDF.
///
/// `Empty` is the normal result for image-only documents and is kept apart
/// from [`IngestError::PdfParse`], which means the bytes were not a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text {
        pages: Vec<PageText>,
        page_count: usize,
    },
    Empty {
        page_count: usize,
    },
}

impl Extraction {
    pub fn page_count(&self) -> usize {
        match self {
            Self::Text { page_count, .. } | Self::Empty { page_count } => *page_count,
        }
    }

    /// Page texts joined in page order, each page terminated by a newline.
    pub fn full_text(&self) -> Option<String> {
        match self {
            Self::Empty { .. } => None,
            Self::Text { pages, .. } => {
                let mut text = String::new();
                for page in pages {
                    text.push_str(&page.text);
                    if !page.text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                Some(text)
            }
        }
    }
}

pub trait PdfExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
        let page_count = page_numbers.len();

        let mut pages = Vec::new();
        for page_no in page_numbers {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(page = page_no, %error, "skipping page without extractable text");
                    continue;
                }
            };

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        debug!(page_count, text_pages = pages.len(), "pdf text extracted");

        if pages.is_empty() {
            return Ok(Extraction::Empty { page_count });
        }

        Ok(Extraction::Text { pages, page_count })
    }
}

pub fn extract_page_texts(bytes: &[u8]) -> Result<Extraction, IngestError> {
    LopdfExtractor.extract(bytes)
}
