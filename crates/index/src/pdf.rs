use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("could not extract text from `{path}`: {message}")]
    Extract { path: String, message: String },
}

/// Extract one text string per page. Pages that render to whitespace only
/// are kept here; the indexer filters them out so page numbering stays
/// aligned with the source document.
pub fn extract_pages(path: &Path) -> Result<Vec<String>, PdfError> {
    pdf_extract::extract_text_by_pages(path).map_err(|error| PdfError::Extract {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}

pub fn is_pdf_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}
