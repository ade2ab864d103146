/// Default chunk length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Unique identifier of the chunk, `<source>_<index>`
    pub id: String,
    /// The actual text content of this chunk
    pub text: String,
    /// File name of the document this chunk belongs to
    pub source: String,
}

/// Build the id of the chunk at `index` within `source`
pub fn chunk_id(source: &str, index: usize) -> String {
    format!("{}_{}", source, index)
}

/// Split text into consecutive chunks of at most `chunk_size` characters.
///
/// Chunks never overlap and never split a character; joining them gives back
/// the input. No attempt is made to respect word or sentence boundaries.
pub fn split_into_chunks(text: &str, source: &str, chunk_size: usize) -> Vec<DocumentChunk> {
    let chunk_size = chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars_in_chunk = 0;

    for (position, _) in text.char_indices() {
        if chars_in_chunk == chunk_size {
            chunks.push(&text[start..position]);
            start = position;
            chars_in_chunk = 0;
        }
        chars_in_chunk += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, piece)| DocumentChunk {
            id: chunk_id(source, index),
            text: piece.to_string(),
            source: source.to_string(),
        })
        .collect()
}
