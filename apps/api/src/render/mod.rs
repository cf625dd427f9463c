//! Template Renderer: validated document + layout template → complete HTML string.
//!
//! Template text is resolved by document kind through a `TemplateLookup`; nothing is
//! embedded here. Rendering is a pure transform and fails fast on any placeholder the
//! document cannot satisfy.

pub mod template;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::schema::{Document, DocumentKind};

pub use template::Template;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template '{template}' not found at {path}: {source}")]
    TemplateNotFound {
        template: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(test)]
    #[error("no template registered for '{0}'")]
    NotRegistered(DocumentKind),

    #[error("template '{template}' has a syntax error: {message}")]
    Syntax { template: String, message: String },

    #[error("template '{template}' references unknown field '{placeholder}'")]
    UnresolvedPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("template '{template}' prints '{placeholder}', which is not a single value")]
    NotAScalar {
        template: String,
        placeholder: String,
    },

    #[error("template '{template}' iterates '{placeholder}', which is not a list")]
    NotAList {
        template: String,
        placeholder: String,
    },

    #[error("failed to serialize document for rendering: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Template lookup
// ────────────────────────────────────────────────────────────────────────────

/// Resolves a document kind to its template source text.
pub trait TemplateLookup: Send + Sync {
    fn source(&self, kind: DocumentKind) -> Result<String, RenderError>;
}

/// Reads `<dir>/<stem>_template.html`, e.g. `templates/cv_template.html`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(format!("{}_template.html", kind.stem()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateLookup for DirectoryTemplates {
    fn source(&self, kind: DocumentKind) -> Result<String, RenderError> {
        let path = self.path_for(kind);
        std::fs::read_to_string(&path).map_err(|source| RenderError::TemplateNotFound {
            template: kind.stem().to_string(),
            path,
            source,
        })
    }
}

/// Fixed set of templates held in memory.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    sources: std::collections::HashMap<DocumentKind, String>,
}

#[cfg(test)]
impl InMemoryTemplates {
    pub fn with(mut self, kind: DocumentKind, source: impl Into<String>) -> Self {
        self.sources.insert(kind, source.into());
        self
    }
}

#[cfg(test)]
impl TemplateLookup for InMemoryTemplates {
    fn source(&self, kind: DocumentKind) -> Result<String, RenderError> {
        self.sources
            .get(&kind)
            .cloned()
            .ok_or(RenderError::NotRegistered(kind))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Renderer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Renderer {
    lookup: Arc<dyn TemplateLookup>,
}

impl Renderer {
    pub fn new(lookup: Arc<dyn TemplateLookup>) -> Self {
        Self { lookup }
    }

    pub fn template(&self, kind: DocumentKind) -> Result<Template, RenderError> {
        let source = self.lookup.source(kind)?;
        Template::parse(kind.stem(), &source)
    }

    /// Parses both layouts and checks their placeholders against the schemas.
    pub fn verify(&self) -> Result<(), RenderError> {
        for kind in [DocumentKind::Cv, DocumentKind::CoverLetter] {
            self.template(kind)?.verify_against(kind.schema())?;
        }
        Ok(())
    }

    pub fn render<D: Document>(&self, document: &D) -> Result<String, RenderError> {
        let template = self.template(D::KIND)?;
        let data = serde_json::to_value(document)?;
        let html = template.render(&data)?;
        debug!(document = %D::KIND, bytes = html.len(), "rendered HTML");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoverLetter, Cv};
    use crate::validation::fixtures::{cover_letter, minimal_cv};
    use crate::validation::validate_document;

    fn shipped_templates() -> DirectoryTemplates {
        DirectoryTemplates::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
    }

    #[test]
    fn test_minimal_cv_renders_with_full_name_verbatim() {
        let cv: Cv = validate_document(&minimal_cv()).unwrap();
        let renderer = Renderer::new(Arc::new(shipped_templates()));

        let html = renderer.render(&cv).unwrap();
        assert!(!html.is_empty());
        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains("Designed the difference engine control plane"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_cover_letter_renders_all_paragraphs() {
        let letter: CoverLetter = validate_document(&cover_letter()).unwrap();
        let renderer = Renderer::new(Arc::new(shipped_templates()));

        let html = renderer.render(&letter).unwrap();
        for paragraph in &letter.paragraphs {
            assert!(html.contains(paragraph.as_str()));
        }
        assert!(html.contains("2024-02-07"));
        assert!(html.contains("Charles Babbage"));
    }

    #[test]
    fn test_shipped_templates_agree_with_schemas() {
        let renderer = Renderer::new(Arc::new(shipped_templates()));
        renderer.verify().unwrap();
    }

    #[test]
    fn test_subset_of_fields_renders() {
        let cv: Cv = validate_document(&minimal_cv()).unwrap();
        let lookup = InMemoryTemplates::default()
            .with(DocumentKind::Cv, "<html>{{full_name}} / {{email}}</html>");
        let html = Renderer::new(Arc::new(lookup)).render(&cv).unwrap();
        assert_eq!(html, "<html>Ada Lovelace / ada@example.com</html>");
    }

    #[test]
    fn test_unknown_field_fails_explicitly() {
        let cv: Cv = validate_document(&minimal_cv()).unwrap();
        let lookup =
            InMemoryTemplates::default().with(DocumentKind::Cv, "<html>{{github_url}}</html>");
        let err = Renderer::new(Arc::new(lookup)).render(&cv).unwrap_err();
        assert_eq!(
            err.to_string(),
            "template 'cv' references unknown field 'github_url'"
        );
    }

    #[test]
    fn test_missing_template_reported() {
        let cv: Cv = validate_document(&minimal_cv()).unwrap();
        let err = Renderer::new(Arc::new(InMemoryTemplates::default()))
            .render(&cv)
            .unwrap_err();
        assert!(matches!(err, RenderError::NotRegistered(DocumentKind::Cv)));

        let dir = tempfile::tempdir().unwrap();
        let err = Renderer::new(Arc::new(DirectoryTemplates::new(dir.path())))
            .render(&cv)
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound { .. }));
    }
}
