//! Publication list rendering.
//!
//! Templates are Jinja-style and receive a single variable, `publications`,
//! holding the ordered, normalized entries. Output is not autoescaped: the
//! normalizer already emits HTML entities.

use std::path::{Path, PathBuf};

use minijinja::{context, path_loader, AutoEscape, Environment, ErrorKind};
use thiserror::Error;
use tracing::debug;

use crate::record::Publication;

/// Name of the template used when nothing else is configured.
pub const DEFAULT_TEMPLATE: &str = "publications";

const TEMPLATE_EXTENSION: &str = ".html";

/// Errors that can occur when rendering a publication list.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Render(#[from] minijinja::Error),
}

/// Renders publication lists.
///
/// Holds the theme environment: templates are looked up in the theme
/// directory first and fall back to the builtin templates. A `Renderer` is
/// created once by the host and handed to every directive that needs it.
pub struct Renderer {
    env: Environment<'static>,
    template_name: String,
    theme_dir: Option<PathBuf>,
}

impl Renderer {
    /// A renderer that only knows the builtin templates.
    pub fn new() -> Self {
        Self::build(None, DEFAULT_TEMPLATE)
    }

    /// A renderer that looks for `<template_name>.html` in `theme_dir`
    /// before falling back to the builtin template of the same name.
    pub fn with_theme_dir(theme_dir: impl Into<PathBuf>, template_name: &str) -> Self {
        Self::build(Some(theme_dir.into()), template_name)
    }

    /// Overrides the theme template name.
    pub fn with_template_name(self, template_name: &str) -> Self {
        Self::build(self.theme_dir, template_name)
    }

    fn build(theme_dir: Option<PathBuf>, template_name: &str) -> Self {
        let mut env = new_environment();
        let theme_loader = theme_dir.clone().map(path_loader);
        env.set_loader(move |name: &str| {
            if let Some(loader) = &theme_loader {
                if let Some(source) = loader(name)? {
                    return Ok(Some(source));
                }
            }
            Ok(name
                .strip_suffix(TEMPLATE_EXTENSION)
                .and_then(builtin_template)
                .map(str::to_string))
        });
        Self {
            env,
            template_name: template_name.to_string(),
            theme_dir,
        }
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Renders with the theme (or builtin) template.
    pub fn render(&self, publications: &[Publication]) -> Result<String, TemplateError> {
        let name = format!("{}{}", self.template_name, TEMPLATE_EXTENSION);
        debug!(template = %name, entries = publications.len(), "rendering theme template");
        render_with(&self.env, &name, publications)
    }

    /// Renders with an explicit template file.
    ///
    /// The file's directory becomes the loader root, so the template may
    /// include or extend its siblings.
    pub fn render_file(
        &self,
        template_path: &Path,
        publications: &[Publication],
    ) -> Result<String, TemplateError> {
        let not_found = || TemplateError::NotFound(template_path.display().to_string());
        let file_name = template_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(not_found)?;
        let dir = match template_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut env = new_environment();
        env.set_loader(path_loader(dir));
        debug!(template = %template_path.display(), entries = publications.len(), "rendering template file");
        render_with(&env, file_name, publications).map_err(|e| match e {
            TemplateError::NotFound(_) => not_found(),
            other => other,
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env
}

fn render_with(
    env: &Environment<'_>,
    name: &str,
    publications: &[Publication],
) -> Result<String, TemplateError> {
    let template = env.get_template(name).map_err(|e| match e.kind() {
        ErrorKind::TemplateNotFound => TemplateError::NotFound(name.to_string()),
        _ => TemplateError::Render(e),
    })?;
    Ok(template.render(context! { publications => publications })?)
}

/// Single source of truth for builtin templates: (name, source).
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (DEFAULT_TEMPLATE, PUBLICATIONS_TEMPLATE),
    ("compact", COMPACT_TEMPLATE),
];

/// Returns a builtin template by name (without extension).
pub fn builtin_template(name: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
}

/// Returns the list of available builtin template names.
pub fn builtin_template_names() -> Vec<&'static str> {
    BUILTIN_TEMPLATES.iter().map(|(n, _)| *n).collect()
}

const PUBLICATIONS_TEMPLATE: &str = r#"<ul class="publications">
{% for pub in publications %}
  <li id="{{ pub.id }}">
    {% if pub.author %}
    <span class="authors">{% for a in pub.author %}{{ a[0] }}{% if a[1] %}, {{ a[1] }}{% endif %}{% if not loop.last %}; {% endif %}{% endfor %}</span>.
    {% endif %}
    {% if pub.title %}
    <span class="title">{{ pub.title }}</span>.
    {% endif %}
    {% if pub.journal %}
    <em class="journal">{{ pub.journal }}</em>{% if pub.volume %} {{ pub.volume }}{% endif %}{% if pub.pages %}, {{ pub.pages }}{% endif %}.
    {% elif pub.pages %}
    pp. {{ pub.pages }}.
    {% endif %}
    {% if pub.year %}
    <span class="year">{% if pub.month %}{{ pub.month }} {% endif %}{{ pub.year }}</span>.
    {% endif %}
  </li>
{% endfor %}
</ul>
"#;

const COMPACT_TEMPLATE: &str = r#"<ol class="publications">
{% for pub in publications %}
  <li id="{{ pub.id }}">{% for a in pub.author or [] %}{{ a[0] }}{% if not loop.last %}, {% endif %}{% endfor %} ({{ pub.year }}). {{ pub.title }}.</li>
{% endfor %}
</ol>
"#;
