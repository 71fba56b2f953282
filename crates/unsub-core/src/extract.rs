//! PDF text extraction
//!
//! Converts a PDF byte stream into raw page text and applies the
//! meaningfulness heuristic: machine-readable bank statements contain dates,
//! amounts and a reasonable digit density, while scanned-image PDFs yield
//! near-empty or garbage text. We reject the latter outright instead of
//! attempting OCR.

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

/// Minimum text length for a statement to be considered machine-readable
const MIN_TEXT_LENGTH: usize = 50;

/// Minimum fraction of numeric characters in the extracted text
const MIN_NUMERIC_DENSITY: f64 = 0.02;

/// Extracted PDF content
#[derive(Debug, Clone)]
pub struct PdfText {
    /// Concatenated page text, line breaks between pages
    pub text: String,
    pub page_count: usize,
}

/// Extract text from a PDF byte buffer.
///
/// Fails with [`Error::PdfStructure`] when the file is not a parseable PDF,
/// and with [`Error::ScannedDocument`] when text extraction succeeds but the
/// result does not look like financial statement text.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::PdfStructure(format!("not a readable PDF: {}", e)))?;
    let page_count = doc.get_pages().len();

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::PdfStructure(format!("text extraction failed: {}", e)))?;

    // Normalize page breaks: pdf-extract emits form feeds between pages.
    let text = text.replace('\u{c}', "\n");

    debug!(
        page_count,
        text_len = text.len(),
        "extracted PDF text"
    );

    check_meaningful(&text)?;

    Ok(PdfText { text, page_count })
}

/// The meaningfulness heuristic from the module docs.
fn check_meaningful(text: &str) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.len() < MIN_TEXT_LENGTH {
        return Err(Error::ScannedDocument(format!(
            "only {} characters of text extracted",
            trimmed.len()
        )));
    }

    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    let density = digits as f64 / trimmed.chars().count() as f64;
    if density < MIN_NUMERIC_DENSITY {
        return Err(Error::ScannedDocument(format!(
            "numeric density {:.1}% is below the statement threshold",
            density * 100.0
        )));
    }

    if !has_date_like(trimmed)? {
        return Err(Error::ScannedDocument(
            "no date-like text found".to_string(),
        ));
    }

    if !has_amount_like(trimmed)? {
        return Err(Error::ScannedDocument(
            "no amount-like text found".to_string(),
        ));
    }

    Ok(())
}

fn has_date_like(text: &str) -> Result<bool> {
    // Numeric dates (15.03.2024, 15/03/2024, 15-03-2024, 2024-03-15) or
    // day + month word + year in any language that uses Latin letters.
    let numeric = Regex::new(r"\b\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b")?;
    let worded = Regex::new(r"(?i)\b\d{1,2}\s+[a-zăâîșşțţ]{3,}\.?\s+\d{4}\b")?;
    Ok(numeric.is_match(text) || worded.is_match(text))
}

fn has_amount_like(text: &str) -> Result<bool> {
    let amount = Regex::new(r"\d+[.,]\d{2}\b")?;
    Ok(amount.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meaningful_statement_text_passes() {
        let text = "Extras de cont\n\
                    15.03.2024  NETFLIX.COM  45.00 RON\n\
                    20.03.2024  SPOTIFY      19.99 RON\n\
                    Sold final: 1,234.56 RON";
        assert!(check_meaningful(text).is_ok());
    }

    #[test]
    fn test_short_text_rejected() {
        let err = check_meaningful("abc").unwrap_err();
        assert!(matches!(err, Error::ScannedDocument(_)));
        assert_eq!(err.code(), "pdf_scanned");
    }

    #[test]
    fn test_no_digits_rejected() {
        let text = "this is a long paragraph of prose with no financial content \
                    whatsoever, just words and more words across several lines";
        assert!(matches!(
            check_meaningful(text),
            Err(Error::ScannedDocument(_))
        ));
    }

    #[test]
    fn test_no_date_rejected() {
        // Digits and amounts, but nothing date-shaped
        let text = "account balance 1234.56 plus fees 10.00 and interest 3.50 \
                    for a running total of 1248.06 in the period";
        assert!(matches!(
            check_meaningful(text),
            Err(Error::ScannedDocument(_))
        ));
    }

    #[test]
    fn test_worded_date_accepted() {
        let text = "Tranzactii efectuate in perioada analizata:\n\
                    12 martie 2024 plata NETFLIX suma 45.00\n\
                    12 aprilie 2024 plata NETFLIX suma 45.00";
        assert!(check_meaningful(text).is_ok());
    }

    #[test]
    fn test_garbage_bytes_are_pdf_structure_error() {
        let err = extract_pdf_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::PdfStructure(_)));
        assert_eq!(err.code(), "pdf_unreadable");
    }
}
