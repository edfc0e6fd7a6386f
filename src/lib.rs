//! publications: expand BibTeX publication lists inside text documents.
//!
//! This library provides functionality to:
//! - Find `.. publications::` directives in a document
//! - Load BibTeX files and normalize their entries for HTML output
//! - Order entries by key, date or first author
//! - Render the ordered list through a Jinja-style template

pub mod bibtex;
pub mod config;
pub mod directive;
pub mod normalize;
pub mod output;
pub mod processor;
pub mod record;
pub mod sort;
pub mod template;

pub use bibtex::{load_bibtex, parse_bibtex};
pub use config::Config;
pub use directive::{extract_directives, Directive};
pub use normalize::normalize;
pub use output::replace_directives;
pub use processor::{prepare_publications, ProcessedDirective, Processor};
pub use record::{Author, Publication, Record};
pub use sort::{sort_entries, sort_publications, SortMode};
pub use template::{builtin_template, builtin_template_names, Renderer};
