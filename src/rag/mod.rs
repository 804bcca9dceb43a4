//! Retrieval, answer generation and citation handling.
//!
//! [`Retriever`] selects the context, [`format_context`] serializes it for the
//! answer model, and [`CitationExtractor`] maps the answer back to timestamped
//! sources that [`render_console`] and [`render_markdown`] present.

mod answer;
mod citations;
mod context;
mod render;
mod retriever;

pub use answer::{parse_answer, AnswerGenerator, GeneratedAnswer, SourceCitation};
pub use citations::{
    format_timestamp, CitationExtractor, CitationMode, StructuredSource, TimestampReference,
};
pub use context::format_context;
pub use render::{render_console, render_markdown, NO_DOCUMENTS_MESSAGE};
pub use retriever::{merge_ranked, sort_chronologically, Retriever};
