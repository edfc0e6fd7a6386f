//! BibTeX file loading.
//!
//! Parsing is delegated to the `biblatex` crate, which also resolves TeX
//! accent commands to Unicode. Each field's chunks are flattened back into a
//! TeX-flavoured string so that the normalizer sees the escapes it converts
//! to HTML: brace-protected text keeps its braces, and `\&`, `\{` and `\}`
//! come out exactly as they were written.
//!
//! biblatex resolves those three escapes to bare characters, which cannot be
//! told apart from the braces of a TeX command afterwards. They are swapped
//! for placeholders of the same byte length before parsing and restored
//! after, so offsets in parse errors still point into the source.

use std::fs;
use std::path::Path;

use biblatex::{Bibliography, Chunk, Spanned};
use thiserror::Error;
use tracing::debug;

use crate::record::Record;

/// Errors that can occur when loading a bibliography.
#[derive(Error, Debug)]
pub enum BibError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid BibTeX: {0}")]
    ParseError(String),
}

/// Loads all records from a `.bib` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid BibTeX.
pub fn load_bibtex(path: &Path) -> Result<Vec<Record>, BibError> {
    let content = fs::read_to_string(path)?;
    let records = parse_bibtex(&content)?;
    debug!(path = %path.display(), entries = records.len(), "loaded bibliography");
    Ok(records)
}

/// Parses BibTeX source into records, in file order.
pub fn parse_bibtex(src: &str) -> Result<Vec<Record>, BibError> {
    let protected = protect_escapes(src);
    let bibliography =
        Bibliography::parse(&protected).map_err(|e| BibError::ParseError(e.to_string()))?;

    let records = bibliography
        .iter()
        .map(|entry| {
            let mut record = Record::new(
                entry.key.clone(),
                entry.entry_type.to_string().to_lowercase(),
            );
            for (name, chunks) in &entry.fields {
                record
                    .fields
                    .insert(name.to_lowercase(), chunks_to_tex(chunks));
            }
            record
        })
        .collect();

    Ok(records)
}

/// Escaped characters kept through parsing, with their placeholders.
const PROTECTED_ESCAPES: &[(char, &str)] = &[
    ('&', "\u{1}\u{2}"),
    ('{', "\u{1}\u{3}"),
    ('}', "\u{1}\u{4}"),
];

/// Replaces protected escapes with placeholders.
///
/// Escaped backslashes are skipped as a pair, so `\\{` stays a real brace.
/// `\o{}` is rewritten as `{\o}`: with an empty argument biblatex yields a
/// lone combining solidus instead of `ø`.
fn protect_escapes(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let escape = &rest[pos..];

        if let Some(after) = escape.strip_prefix(r"\o{}") {
            out.push_str(r"{\o}");
            rest = after;
            continue;
        }

        let Some(c) = escape[1..].chars().next() else {
            out.push('\\');
            rest = "";
            break;
        };
        match PROTECTED_ESCAPES.iter().find(|(escaped, _)| *escaped == c) {
            Some((_, placeholder)) => out.push_str(placeholder),
            None => {
                out.push('\\');
                out.push(c);
            }
        }
        rest = &escape[1 + c.len_utf8()..];
    }

    out.push_str(rest);
    out
}

/// Turns placeholders back into the escapes they stand for.
fn restore_escapes(s: &str, out: &mut String) {
    let restored = PROTECTED_ESCAPES
        .iter()
        .fold(s.to_string(), |text, (escaped, placeholder)| {
            text.replace(placeholder, &format!("\\{}", escaped))
        });
    out.push_str(&restored);
}

/// Flattens parsed chunks back into a TeX-flavoured string.
fn chunks_to_tex(chunks: &[Spanned<Chunk>]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        match &chunk.v {
            Chunk::Normal(s) => restore_escapes(s, &mut out),
            Chunk::Verbatim(s) => {
                out.push('{');
                restore_escapes(s, &mut out);
                out.push('}');
            }
            Chunk::Math(s) => {
                out.push('$');
                restore_escapes(s, &mut out);
                out.push('$');
            }
        }
    }
    out
}
