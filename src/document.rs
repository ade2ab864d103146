use crate::error::{RagError, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_from_mem;
use std::path::Path;

/// Represents an uploaded document with its extracted text
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name (used as chunk source)
    pub source: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Extract a document from uploaded bytes, choosing the reader by file name
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let source = source_name(file_name)?;

        // Detect MIME type
        let mime = from_path(&source).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(&source, bytes, &mime_type)?;

        Ok(Document {
            content,
            source,
            mime_type,
        })
    }

    /// Whether extraction produced any non-whitespace text
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Keep only the final path component of an uploaded file name
fn source_name(file_name: &str) -> Result<String> {
    Path::new(file_name.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RagError::Validation(format!("Invalid file name: {:?}", file_name)))
}

/// Read content from document bytes based on their MIME type
pub fn read_document_content(source: &str, bytes: &[u8], mime_type: &str) -> Result<String> {
    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", source);
            let content = extract_text_from_mem(bytes).map_err(|e| {
                RagError::Internal(format!("Failed to extract text from PDF {}: {}", source, e))
            })?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Handle plain text documents
        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", source);
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }

        // Unsupported format
        _ => Err(RagError::Validation(format!(
            "Unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        ))),
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
