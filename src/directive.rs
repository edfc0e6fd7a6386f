//! Publication directive parser.
//!
//! Finds blocks of the form
//!
//! ```text
//! .. publications:: path/to/refs.bib [path/to/template.html]
//!    :sort: date
//!    :template: path/to/template.html
//! ```
//!
//! in a text document. The directive line may be indented; option lines
//! are the indented `:name: value` lines that directly follow it.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::sort::{SortError, SortMode};

/// Errors in the directive syntax. Line numbers are 1-indexed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("line {line}: publications directive requires a bibliography path")]
    MissingArgument { line: usize },

    #[error("line {line}: publications directive takes at most 2 arguments, got {count}")]
    TooManyArguments { line: usize, count: usize },

    #[error("line {line}: unknown option ':{name}:' (expected :sort: or :template:)")]
    UnknownOption { line: usize, name: String },

    #[error("line {line}: option ':{name}:' given more than once")]
    DuplicateOption { line: usize, name: String },

    #[error("line {line}: option ':{name}:' requires a value")]
    EmptyOption { line: usize, name: String },

    #[error("line {line}: template given both as argument and as :template: option")]
    ConflictingTemplate { line: usize },

    #[error("line {line}: {source}")]
    InvalidSort {
        line: usize,
        #[source]
        source: SortError,
    },
}

/// One `publications` directive found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Path to the `.bib` file, as written in the document
    pub bib_path: PathBuf,
    /// Explicit template file, if any
    pub template: Option<PathBuf>,
    /// Explicit sort mode, if any
    pub sort: Option<SortMode>,
    /// Start and end byte positions of the whole block in the source text
    pub span: (usize, usize),
    /// Line of the directive marker (1-indexed)
    pub line: usize,
}

/// Extracts all publication directives from a document, in order.
///
/// # Errors
///
/// Returns the first malformed directive found. A document with a bad
/// directive is rejected as a whole.
///
/// # Examples
///
/// ```
/// use publications::extract_directives;
///
/// let doc = "Intro\n\n.. publications:: refs.bib\n   :sort: key\n\nOutro\n";
/// let directives = extract_directives(doc).unwrap();
/// assert_eq!(directives.len(), 1);
/// assert_eq!(&doc[directives[0].span.0..directives[0].span.1],
///            ".. publications:: refs.bib\n   :sort: key");
/// ```
pub fn extract_directives(text: &str) -> Result<Vec<Directive>, DirectiveError> {
    let directive_re = directive_regex();
    let option_re = option_regex();

    let lines = split_lines(text);
    let mut directives = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let (start, content) = lines[i];
        let Some(cap) = directive_re.captures(content) else {
            i += 1;
            continue;
        };

        let line = i + 1;
        let indent = cap[1].len();
        let args: Vec<&str> = cap[2].split_whitespace().collect();
        let (bib_path, mut template) = match args.as_slice() {
            [] => return Err(DirectiveError::MissingArgument { line }),
            [bib] => (PathBuf::from(*bib), None),
            [bib, template] => (PathBuf::from(*bib), Some(PathBuf::from(*template))),
            _ => {
                return Err(DirectiveError::TooManyArguments {
                    line,
                    count: args.len(),
                })
            }
        };
        let positional_template = template.is_some();

        let mut sort = None;
        let mut seen: Vec<String> = Vec::new();
        let mut end = start + content.len();
        i += 1;

        // Option block
        while i < lines.len() {
            let (option_start, option_content) = lines[i];
            let Some(opt) = option_re.captures(option_content) else {
                break;
            };
            if opt[1].len() <= indent {
                break;
            }

            let option_line = i + 1;
            let name = opt[2].to_string();
            let value = opt[3].trim();

            if seen.contains(&name) {
                return Err(DirectiveError::DuplicateOption {
                    line: option_line,
                    name,
                });
            }
            if value.is_empty() && (name == "sort" || name == "template") {
                return Err(DirectiveError::EmptyOption {
                    line: option_line,
                    name,
                });
            }

            match name.as_str() {
                "sort" => {
                    let mode = value.parse::<SortMode>().map_err(|source| {
                        DirectiveError::InvalidSort {
                            line: option_line,
                            source,
                        }
                    })?;
                    sort = Some(mode);
                }
                "template" => {
                    if positional_template {
                        return Err(DirectiveError::ConflictingTemplate { line });
                    }
                    template = Some(PathBuf::from(value));
                }
                _ => {
                    return Err(DirectiveError::UnknownOption {
                        line: option_line,
                        name,
                    })
                }
            }

            seen.push(name);
            end = option_start + option_content.len();
            i += 1;
        }

        directives.push(Directive {
            bib_path,
            template,
            sort,
            span: (start + indent, end),
            line,
        });
    }

    Ok(directives)
}

/// `.. publications:: args`, capturing the indent and the arguments.
fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([ \t]*)\.\.[ \t]+publications::(.*)$").expect("static regex is valid")
    })
}

/// An indented `:name: value` option line.
fn option_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([ \t]+):([A-Za-z][A-Za-z_-]*):(.*)$").expect("static regex is valid")
    })
}

/// Splits text into (byte offset, line content) pairs, without line endings.
fn split_lines(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let content = raw
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(raw);
        lines.push((offset, content));
        offset += raw.len();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_directive() {
        // Given: a document with a bare directive
        let text = "Before\n.. publications:: refs.bib\nAfter";

        // When: we extract directives
        let directives = extract_directives(text).unwrap();

        // Then: one directive with no options, spanning exactly its line
        assert_eq!(directives.len(), 1);
        let d = &directives[0];
        assert_eq!(d.bib_path, PathBuf::from("refs.bib"));
        assert_eq!(d.template, None);
        assert_eq!(d.sort, None);
        assert_eq!(d.line, 2);
        assert_eq!(&text[d.span.0..d.span.1], ".. publications:: refs.bib");
    }

    #[test]
    fn test_extract_directive_with_options() {
        let text = ".. publications:: refs.bib\n    :sort: name\n    :template: tpl/list.html\n\nText";

        let directives = extract_directives(text).unwrap();

        let d = &directives[0];
        assert_eq!(d.sort, Some(SortMode::ByAuthor));
        assert_eq!(d.template, Some(PathBuf::from("tpl/list.html")));
        assert_eq!(
            &text[d.span.0..d.span.1],
            ".. publications:: refs.bib\n    :sort: name\n    :template: tpl/list.html"
        );
    }

    #[test]
    fn test_extract_positional_template() {
        let text = ".. publications:: refs.bib list.html";

        let directives = extract_directives(text).unwrap();

        assert_eq!(directives[0].template, Some(PathBuf::from("list.html")));
    }

    #[test]
    fn test_extract_indented_directive() {
        let text = "  .. publications:: refs.bib\n      :sort: key\n";

        let directives = extract_directives(text).unwrap();

        let d = &directives[0];
        assert_eq!(d.sort, Some(SortMode::ById));
        assert_eq!(
            &text[d.span.0..d.span.1],
            ".. publications:: refs.bib\n      :sort: key"
        );
    }

    #[test]
    fn test_option_block_requires_deeper_indent() {
        // An option-looking line at the directive's own indent is not an option
        let text = "  .. publications:: refs.bib\n  :sort: key\n";

        let directives = extract_directives(text).unwrap();

        assert_eq!(directives[0].sort, None);
        assert_eq!(
            &text[directives[0].span.0..directives[0].span.1],
            ".. publications:: refs.bib"
        );
    }

    #[test]
    fn test_extract_multiple_directives() {
        let text = ".. publications:: a.bib\n\nMiddle\n\n.. publications:: b.bib\n   :sort: date\n";

        let directives = extract_directives(text).unwrap();

        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].bib_path, PathBuf::from("a.bib"));
        assert_eq!(directives[1].bib_path, PathBuf::from("b.bib"));
        assert_eq!(directives[1].line, 5);
    }

    #[test]
    fn test_extract_handles_crlf() {
        let text = ".. publications:: refs.bib\r\n   :sort: key\r\nAfter";

        let directives = extract_directives(text).unwrap();

        let d = &directives[0];
        assert_eq!(d.sort, Some(SortMode::ById));
        assert_eq!(
            &text[d.span.0..d.span.1],
            ".. publications:: refs.bib\r\n   :sort: key"
        );
    }

    #[test]
    fn test_other_directives_are_ignored() {
        let text = ".. image:: picture.png\n.. publication:: x.bib\n";

        let directives = extract_directives(text).unwrap();

        assert!(directives.is_empty());
    }

    #[test]
    fn test_regexes_are_built_once() {
        assert!(std::ptr::eq(directive_regex(), directive_regex()));
        assert!(std::ptr::eq(option_regex(), option_regex()));
    }

    #[test]
    fn test_no_directives() {
        assert!(extract_directives("Plain text.").unwrap().is_empty());
        assert!(extract_directives("").unwrap().is_empty());
    }

    // ============================================
    // Error cases
    // ============================================

    #[test]
    fn test_missing_argument() {
        let err = extract_directives("x\n.. publications::\n").unwrap_err();

        assert_eq!(err, DirectiveError::MissingArgument { line: 2 });
    }

    #[test]
    fn test_too_many_arguments() {
        let err = extract_directives(".. publications:: a.bib b.html c").unwrap_err();

        assert_eq!(err, DirectiveError::TooManyArguments { line: 1, count: 3 });
    }

    #[test]
    fn test_invalid_sort_option() {
        let err = extract_directives(".. publications:: a.bib\n   :sort: popularity").unwrap_err();

        assert_eq!(
            err,
            DirectiveError::InvalidSort {
                line: 2,
                source: SortError::InvalidSortMode("popularity".to_string())
            }
        );
        assert!(err.to_string().contains("popularity"));
    }

    #[test]
    fn test_unknown_option() {
        let err = extract_directives(".. publications:: a.bib\n   :style: fancy").unwrap_err();

        assert_eq!(
            err,
            DirectiveError::UnknownOption {
                line: 2,
                name: "style".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_option() {
        let text = ".. publications:: a.bib\n   :sort: key\n   :sort: date";

        let err = extract_directives(text).unwrap_err();

        assert_eq!(
            err,
            DirectiveError::DuplicateOption {
                line: 3,
                name: "sort".to_string()
            }
        );
    }

    #[test]
    fn test_empty_option_value() {
        let err = extract_directives(".. publications:: a.bib\n   :template:").unwrap_err();

        assert!(matches!(err, DirectiveError::EmptyOption { line: 2, .. }));
    }

    #[test]
    fn test_conflicting_template() {
        let text = ".. publications:: a.bib one.html\n   :template: two.html";

        let err = extract_directives(text).unwrap_err();

        assert_eq!(err, DirectiveError::ConflictingTemplate { line: 1 });
    }
}
