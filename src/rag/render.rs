//! Console and Markdown renderings of an answer with its sources.

use super::citations::StructuredSource;

/// Returned to UI callers when retrieval finds nothing.
pub const NO_DOCUMENTS_MESSAGE: &str =
    "I could not find any relevant documents to answer your question. Please try rephrasing.";

const NO_SOURCES: &str = "No direct sources cited in the response.";
const RULE_WIDTH: usize = 50;

/// Plain-text block for terminal output.
pub fn render_console(answer: &str, sources: &[StructuredSource]) -> String {
    let mut out = format!("Answer:\n{}\n\nSources:\n", answer);

    if sources.is_empty() {
        out.push_str(&format!("  - {}\n", NO_SOURCES));
        return out;
    }

    let rule = "=".repeat(RULE_WIDTH);
    for source in sources {
        let referenced = source
            .references
            .iter()
            .map(|r| r.formatted.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        out.push_str(&format!("\n{}\n", rule));
        out.push_str(&format!("  Video: {}\n", source.title));
        out.push_str(&format!("  Show:  {}\n", source.show_name));
        out.push_str(&format!("  Link:  {}\n", source.video_href));
        out.push_str(&format!("  Image: {}\n", source.thumbnail_src));
        out.push_str(&format!("  Referenced at: {}\n", referenced));
    }
    out.push_str(&format!("\n{}\n", rule));
    out
}

/// One Markdown document: the answer followed by a Sources section.
pub fn render_markdown(answer: &str, sources: &[StructuredSource]) -> String {
    let mut parts = vec![answer.to_string()];

    if sources.is_empty() {
        parts.push(format!("\n\n---\n**Sources:**\n- {}", NO_SOURCES));
        return parts.join("\n");
    }

    parts.push("\n\n---\n**Sources:**".to_string());
    for source in sources {
        let links = source
            .references
            .iter()
            .map(|r| format!("[{}]({})", r.formatted, r.href))
            .collect::<Vec<_>>()
            .join(", ");

        parts.push(format!("\n\n**{}**", source.title));
        parts.push(format!(
            "[![{}]({})]({})",
            source.title, source.thumbnail_src, source.video_href
        ));
        parts.push(format!("*   **Show:** {}", source.show_name));
        parts.push(format!("*   **Referenced at:** {}", links));
    }
    parts.join("\n")
}
