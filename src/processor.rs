//! Directive processing.
//!
//! Runs the full pipeline for each `publications` directive: load the
//! bibliography, normalize every entry, order the list and render it. The
//! [`Renderer`] is passed in by the host; nothing here holds global state.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bibtex::{load_bibtex, BibError};
use crate::directive::{extract_directives, Directive, DirectiveError};
use crate::normalize::{field_names, normalize_all};
use crate::output::replace_directives;
use crate::record::{Publication, Record};
use crate::sort::{sort_publications, SortError, SortMode};
use crate::template::{Renderer, TemplateError};

/// Errors that can occur during processing.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Invalid directive: {0}")]
    Directive(#[from] DirectiveError),

    #[error("Bibliography '{}': {source}", .path.display())]
    Bibliography {
        path: PathBuf,
        #[source]
        source: BibError,
    },

    #[error("Sort error: {0}")]
    Sort(#[from] SortError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// A directive that has been rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDirective {
    /// The span of the directive block in the original text
    pub original_span: (usize, usize),
    /// The rendered publication list
    pub rendered: String,
    /// Number of entries in the list
    pub entries: usize,
}

/// Normalizes and orders raw records.
///
/// This is the core of the pipeline, shared by every entry point.
pub fn prepare_publications(
    records: Vec<Record>,
    mode: SortMode,
) -> Result<Vec<Publication>, SortError> {
    let publications = normalize_all(records);
    for publication in &publications {
        debug!(id = %publication.id, fields = %field_names(publication), "normalized entry");
    }
    sort_publications(publications, mode)
}

/// Expands `publications` directives against one renderer.
///
/// Relative paths in directives are resolved against `base_dir`, which
/// should be the directory of the document being processed.
pub struct Processor<'r> {
    renderer: &'r Renderer,
    base_dir: PathBuf,
    default_sort: SortMode,
}

impl<'r> Processor<'r> {
    pub fn new(renderer: &'r Renderer) -> Self {
        Self {
            renderer,
            base_dir: PathBuf::from("."),
            default_sort: SortMode::default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Sort mode for directives without a `:sort:` option.
    pub fn with_default_sort(mut self, mode: SortMode) -> Self {
        self.default_sort = mode;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Loads one bibliography file as normalized, ordered publications.
    pub fn load_publications(
        &self,
        bib_path: &Path,
        sort: Option<SortMode>,
    ) -> Result<Vec<Publication>, ProcessorError> {
        let bib_path = self.resolve(bib_path);
        let records = load_bibtex(&bib_path).map_err(|source| ProcessorError::Bibliography {
            path: bib_path.clone(),
            source,
        })?;

        let mode = sort.unwrap_or(self.default_sort);
        let publications = prepare_publications(records, mode)?;
        if publications.is_empty() {
            warn!(path = %bib_path.display(), "bibliography has no entries");
        }
        Ok(publications)
    }

    /// Renders one bibliography file.
    ///
    /// Uses `template` if given, otherwise the renderer's theme template.
    /// Returns the markup and the number of entries rendered.
    pub fn render_bibliography(
        &self,
        bib_path: &Path,
        template: Option<&Path>,
        sort: Option<SortMode>,
    ) -> Result<(String, usize), ProcessorError> {
        let publications = self.load_publications(bib_path, sort)?;

        let rendered = match template {
            Some(template) => self
                .renderer
                .render_file(&self.resolve(template), &publications)?,
            None => self.renderer.render(&publications)?,
        };
        Ok((rendered, publications.len()))
    }

    /// Renders a single directive.
    pub fn process_directive(
        &self,
        directive: &Directive,
    ) -> Result<ProcessedDirective, ProcessorError> {
        debug!(
            line = directive.line,
            bib = %directive.bib_path.display(),
            sort = %directive.sort.unwrap_or(self.default_sort),
            "processing directive"
        );
        let (rendered, entries) = self.render_bibliography(
            &directive.bib_path,
            directive.template.as_deref(),
            directive.sort,
        )?;
        Ok(ProcessedDirective {
            original_span: directive.span,
            rendered,
            entries,
        })
    }

    /// Renders every directive, stopping at the first failure.
    pub fn process_directives(
        &self,
        directives: &[Directive],
    ) -> Result<Vec<ProcessedDirective>, ProcessorError> {
        directives
            .iter()
            .map(|d| self.process_directive(d))
            .collect()
    }

    /// Expands all directives in a document and returns the new text.
    pub fn process_document(&self, text: &str) -> Result<String, ProcessorError> {
        let directives = extract_directives(text)?;
        let processed = self.process_directives(&directives)?;
        info!(
            directives = processed.len(),
            entries = processed.iter().map(|p| p.entries).sum::<usize>(),
            "expanded publication directives"
        );
        Ok(replace_directives(text, &processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const BIB: &str = r#"
@article{b2019,
    author = {Brown, Bob},
    title = {Second},
    year = {2019},
    pages = {5--9}
}

@article{a2021,
    author = {Adams, Alice},
    title = {Third},
    year = {2021}
}

@article{c2020,
    author = {Clark, Carl},
    title = {First},
    year = {2020}
}
"#;

    const ID_TEMPLATE: &str = "{% for p in publications %}{{ p.id }} {% endfor %}";

    fn workspace() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("refs.bib"), BIB).unwrap();
        fs::write(dir.path().join("ids.html"), ID_TEMPLATE).unwrap();
        dir
    }

    // ============================================
    // Tests for prepare_publications()
    // ============================================

    #[test]
    fn test_prepare_publications_normalizes_then_sorts() {
        let records = vec![
            Record::new("old", "misc")
                .with_field("year", "1999")
                .with_field("pages", "1-2"),
            Record::new("new", "misc").with_field("year", "2001"),
        ];

        let publications = prepare_publications(records, SortMode::ByDate).unwrap();

        assert_eq!(publications[0].id, "new");
        assert_eq!(publications[1].get("pages"), Some("1&ndash;2"));
    }

    #[test]
    fn test_prepare_publications_propagates_sort_errors() {
        let records = vec![Record::new("x", "misc").with_field("month", "Smarch")];

        let err = prepare_publications(records, SortMode::ByDate).unwrap_err();

        assert!(matches!(err, SortError::UnknownMonth { .. }));
    }

    // ============================================
    // Tests for Processor
    // ============================================

    #[test]
    fn test_render_bibliography_default_sort_is_date() {
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());

        let (html, entries) = processor
            .render_bibliography(Path::new("refs.bib"), Some(Path::new("ids.html")), None)
            .unwrap();

        assert_eq!(entries, 3);
        assert_eq!(html, "a2021 c2020 b2019 ");
    }

    #[test]
    fn test_render_bibliography_explicit_sort() {
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());

        let (html, _) = processor
            .render_bibliography(
                Path::new("refs.bib"),
                Some(Path::new("ids.html")),
                Some(SortMode::ById),
            )
            .unwrap();

        assert_eq!(html, "a2021 b2019 c2020 ");
    }

    #[test]
    fn test_render_bibliography_configured_default_sort() {
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer)
            .with_base_dir(dir.path())
            .with_default_sort(SortMode::ByAuthor);

        let (html, _) = processor
            .render_bibliography(Path::new("refs.bib"), Some(Path::new("ids.html")), None)
            .unwrap();

        assert_eq!(html, "a2021 b2019 c2020 ");
    }

    #[test]
    fn test_render_bibliography_uses_theme_template() {
        let dir = workspace();
        let theme = tempdir().unwrap();
        fs::write(
            theme.path().join("publications.html"),
            "{% for p in publications %}<{{ p.title }}>{% endfor %}",
        )
        .unwrap();
        let renderer = Renderer::with_theme_dir(theme.path(), "publications");
        let processor = Processor::new(&renderer).with_base_dir(dir.path());

        let (html, _) = processor
            .render_bibliography(Path::new("refs.bib"), None, Some(SortMode::ById))
            .unwrap();

        assert_eq!(html, "<Third><Second><First>");
    }

    #[test]
    fn test_load_publications_normalizes_fields() {
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());

        let publications = processor
            .load_publications(Path::new("refs.bib"), Some(SortMode::ById))
            .unwrap();

        let ids: Vec<_> = publications.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a2021", "b2019", "c2020"]);
        assert_eq!(publications[1].get("pages"), Some("5&ndash;9"));
    }

    #[test]
    fn test_render_bibliography_missing_file() {
        let dir = tempdir().unwrap();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());

        let err = processor
            .render_bibliography(Path::new("missing.bib"), None, None)
            .unwrap_err();

        match err {
            ProcessorError::Bibliography { path, source } => {
                assert!(path.ends_with("missing.bib"));
                assert!(matches!(source, BibError::IoError(_)));
            }
            other => panic!("Expected Bibliography error, got {:?}", other),
        }
    }

    #[test]
    fn test_process_document_replaces_directive() {
        // Given: a document with one directive and surrounding prose
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());
        let text = "My papers:\n\n.. publications:: refs.bib ids.html\n   :sort: key\n\nThanks.\n";

        // When: the document is processed
        let output = processor.process_document(text).unwrap();

        // Then: the block becomes the rendered list and the prose is kept
        assert_eq!(output, "My papers:\n\na2021 b2019 c2020\n\nThanks.\n");
    }

    #[test]
    fn test_process_document_without_directives_is_unchanged() {
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer);

        let output = processor.process_document("Nothing here.\n").unwrap();

        assert_eq!(output, "Nothing here.\n");
    }

    #[test]
    fn test_process_document_invalid_directive() {
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer);

        let err = processor
            .process_document(".. publications:: refs.bib\n   :sort: popularity\n")
            .unwrap_err();

        assert!(matches!(err, ProcessorError::Directive(_)), "got {:?}", err);
    }

    #[test]
    fn test_process_directives_counts_entries() {
        let dir = workspace();
        let renderer = Renderer::new();
        let processor = Processor::new(&renderer).with_base_dir(dir.path());
        let directives =
            extract_directives(".. publications:: refs.bib\n\n.. publications:: refs.bib\n")
                .unwrap();

        let processed = processor.process_directives(&directives).unwrap();

        assert_eq!(processed.len(), 2);
        assert!(processed.iter().all(|p| p.entries == 3));
        assert!(processed[0].rendered.contains(r#"<li id="a2021">"#));
    }
}
