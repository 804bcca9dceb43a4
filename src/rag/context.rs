//! Serializes retrieved chunks into the answer prompt's context block.

use crate::error::Result;
use crate::vector_store::DocumentChunk;

/// Render chunks as numbered transcript/metadata pairs, in the order given.
pub fn format_context(chunks: &[DocumentChunk]) -> Result<String> {
    let mut blocks = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let n = i + 1;
        let metadata = serde_json::to_string(&chunk.metadata)?;
        blocks.push(format!(
            "TRANSCRIPT #{n} TEXT:\n```{}```\nTRANSCRIPT #{n} METADATA:\n```{}```",
            chunk.text, metadata
        ));
    }
    Ok(blocks.join("\n\n"))
}
