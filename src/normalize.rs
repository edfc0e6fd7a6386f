//! Entry normalization.
//!
//! Turns a raw [`Record`] into a [`Publication`]: TeX markup in free-text
//! fields becomes HTML entities, the author string becomes a list of
//! (last, first) pairs and page ranges get an en dash.

use std::sync::OnceLock;

use regex::Regex;

use crate::record::{Author, Publication, Record};

/// Fields whose values are converted with [`tex_to_html`].
const TEX_FIELDS: &[&str] = &["author", "title", "journal"];

/// Name particles that belong to the last name in `First von Last` order.
const NAME_PARTICLES: &[&str] = &["von", "van", "der", "de", "la", "le", "du", "di", "ben"];

const NAME_SUFFIXES: &[&str] = &["jr", "jr.", "jnr", "jnr.", "junior"];

/// Normalizes one record.
///
/// Missing fields are skipped. Fields named `id` or `type` are dropped since
/// those names are taken by the record's key and entry type.
pub fn normalize(record: Record) -> Publication {
    let Record {
        id,
        entry_type,
        mut fields,
    } = record;

    fields.remove("id");
    fields.remove("type");

    for name in TEX_FIELDS {
        if let Some(value) = fields.get_mut(*name) {
            *value = tex_to_html(value);
        }
    }

    let author = fields.remove("author").map(|raw| split_authors(&raw));

    if let Some(pages) = fields.get_mut("pages") {
        *pages = pages_endash(pages);
    }

    Publication {
        id,
        entry_type,
        author,
        fields,
    }
}

/// Normalizes every record, preserving order.
pub fn normalize_all(records: Vec<Record>) -> Vec<Publication> {
    records.into_iter().map(normalize).collect()
}

/// Converts the TeX markup the parser leaves behind into HTML.
///
/// Em dashes are replaced before en dashes. Applying this twice is not
/// guaranteed to be a no-op for input mixing escaped and nested braces.
///
/// # Examples
///
/// ```
/// use publications::normalize::tex_to_html;
///
/// assert_eq!(tex_to_html(r"Salt \& Pepper"), "Salt &amp; Pepper");
/// assert_eq!(tex_to_html("1990--1995"), "1990&ndash;1995");
/// assert_eq!(tex_to_html("{DNA} repair"), "DNA repair");
/// ```
pub fn tex_to_html(tex: &str) -> String {
    tex.replace("\\&", "&amp;")
        .replace("\\o", "\u{f8}")
        .replace("---", "&mdash;")
        .replace("--", "&ndash;")
        .replace("\\{", "&#123;")
        .replace("\\}", "&#125;")
        .replace(&['{', '}'][..], "")
}

fn and_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+and\s+").expect("static regex is valid"))
}

/// Splits a BibTeX author string into (last, first) pairs.
///
/// Names are separated by `and`. Each name may be written `Last, First` or
/// `First Last`; surrounding whitespace is trimmed and empty names skipped.
///
/// # Examples
///
/// ```
/// use publications::normalize::split_authors;
/// use publications::Author;
///
/// let authors = split_authors("Smith, John and Jane Doe");
/// assert_eq!(authors, vec![Author::new("Smith", "John"), Author::new("Doe", "Jane")]);
/// ```
pub fn split_authors(authors: &str) -> Vec<Author> {
    and_separator()
        .split(authors.trim())
        .filter_map(split_name)
        .collect()
}

fn split_name(name: &str) -> Option<Author> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some((last, first)) = name.split_once(',') {
        return Some(Author::new(last.trim(), collapse_whitespace(first)));
    }

    let mut words: Vec<&str> = name.split_whitespace().collect();
    let mut suffix = None;
    if words.len() > 1
        && words
            .last()
            .is_some_and(|w| NAME_SUFFIXES.contains(&w.to_lowercase().as_str()))
    {
        suffix = words.pop();
    }

    // words is non-empty: name has non-whitespace content
    let mut split_at = words.len() - 1;
    while split_at > 0 && NAME_PARTICLES.contains(&words[split_at - 1]) {
        split_at -= 1;
    }

    let mut last = words[split_at..].join(" ");
    if let Some(suffix) = suffix {
        last.push(' ');
        last.push_str(suffix);
    }
    Some(Author::new(last, words[..split_at].join(" ")))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Formats a page range with an HTML en dash.
///
/// Empty segments are dropped, so `12--15` and `12-15` both give
/// `12&ndash;15`. An en dash the parser has already produced counts as a
/// separator too.
pub fn pages_endash(pages: &str) -> String {
    pages
        .split(&['-', '\u{2013}'][..])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("&ndash;")
}

/// Comma-separated field names, for log lines.
pub(crate) fn field_names(publication: &Publication) -> String {
    publication
        .fields
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
