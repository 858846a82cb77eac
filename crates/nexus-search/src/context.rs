//! Prompt context assembly from retrieval results.

use nexus_core::RetrievalResult;

/// First line of every non-empty context.
pub const CONTEXT_HEADER: &str = "Relevant Knowledge Base Information:\n\n";

const ELLIPSIS: &str = "...";

/// Format `results` as a bounded context block for a prompt.
///
/// Each result becomes `[title]\ncontent\nSource: citation\n\n`. Blocks are
/// appended in order while they fit in `max_length` characters. The first
/// block that does not fit is added with its content cut and followed by
/// `...`, but only when at least [`CONTEXT_MIN_TRUNCATED`] characters of
/// content survive; assembly stops there either way. The result is trimmed
/// and never longer than `max_length` characters.
///
/// [`CONTEXT_MIN_TRUNCATED`]: nexus_core::defaults::CONTEXT_MIN_TRUNCATED
pub fn build_context(results: &[RetrievalResult], max_length: usize) -> String {
    let header_len = CONTEXT_HEADER.chars().count();
    if results.is_empty() || header_len > max_length {
        return String::new();
    }

    let mut context = String::from(CONTEXT_HEADER);
    let mut used = header_len;

    for result in results {
        let block = format_block(&result.title, &result.content, result.citation());
        let block_len = block.chars().count();
        if used + block_len <= max_length {
            context.push_str(&block);
            used += block_len;
            continue;
        }

        // Everything except the content, plus the ellipsis.
        let overhead = block_len - result.content.chars().count() + ELLIPSIS.len();
        let available = max_length.saturating_sub(used + overhead);
        if available >= nexus_core::defaults::CONTEXT_MIN_TRUNCATED {
            let cut: String = result.content.chars().take(available).collect();
            context.push_str(&format_block(
                &result.title,
                &format!("{}{}", cut, ELLIPSIS),
                result.citation(),
            ));
        }
        break;
    }

    context.trim().to_string()
}

fn format_block(title: &str, content: &str, citation: &str) -> String {
    format!("[{}]\n{}\nSource: {}\n\n", title, content, citation)
}
