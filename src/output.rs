//! Output generation.
//!
//! Splices rendered publication lists back into the source document in
//! place of their directive blocks.

use crate::processor::ProcessedDirective;

/// Replaces directive blocks in the document with their rendered markup.
///
/// Replacements are applied from the end of the text towards the start so
/// that earlier spans stay valid while later ones are rewritten.
pub fn replace_directives(text: &str, processed: &[ProcessedDirective]) -> String {
    if processed.is_empty() {
        return text.to_string();
    }

    let mut sorted: Vec<_> = processed.iter().collect();
    sorted.sort_by(|a, b| b.original_span.0.cmp(&a.original_span.0));

    let mut result = text.to_string();
    for directive in sorted {
        let (start, end) = directive.original_span;
        result.replace_range(start..end, directive.rendered.trim_end());
    }

    result
}
