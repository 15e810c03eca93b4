//! The external template store contract. A file-backed and an in-memory
//! implementation are provided; a DB-backed one would live with the rest of
//! the persistence layer, out of scope here (spec.md §1).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateFrontmatter {
    pub version: u32,
    pub pipeline: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub required_sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RawTemplate {
    pub content: String,
    pub frontmatter: TemplateFrontmatter,
}

#[derive(Debug, Error)]
pub enum TemplateSourceError {
    #[error("prompt template not found: {0}")]
    NotFound(String),
    #[error("failed to read prompt template {0}: {1}")]
    Io(String, String),
    #[error("malformed frontmatter in prompt template {0}: {1}")]
    MalformedFrontmatter(String, String),
}

pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<RawTemplate, TemplateSourceError>;
}

/// Loads `{name}.md` files from a directory, each a TOML frontmatter block
/// delimited by `+++` followed by the prompt body (§4.B: "files or DB").
pub struct FileTemplateSource {
    root: PathBuf,
}

impl FileTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.md"))
    }

    fn parse(name: &str, raw: &str) -> Result<RawTemplate, TemplateSourceError> {
        let rest = raw.strip_prefix("+++").ok_or_else(|| {
            TemplateSourceError::MalformedFrontmatter(name.to_string(), "missing opening +++".to_string())
        })?;
        let (frontmatter_src, body) = rest.split_once("+++").ok_or_else(|| {
            TemplateSourceError::MalformedFrontmatter(name.to_string(), "missing closing +++".to_string())
        })?;
        let frontmatter: TemplateFrontmatter = toml::from_str(frontmatter_src.trim())
            .map_err(|e| TemplateSourceError::MalformedFrontmatter(name.to_string(), e.to_string()))?;
        Ok(RawTemplate {
            content: body.trim_start_matches('\n').to_string(),
            frontmatter,
        })
    }
}

impl TemplateSource for FileTemplateSource {
    fn load(&self, name: &str) -> Result<RawTemplate, TemplateSourceError> {
        let path = self.path_for(name);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TemplateSourceError::NotFound(name.to_string())
            } else {
                TemplateSourceError::Io(name.to_string(), e.to_string())
            }
        })?;
        Self::parse(name, &raw)
    }
}

/// In-memory template source, convenient for tests and for embedding a
/// fixed prompt set directly in the binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateSource {
    templates: HashMap<String, RawTemplate>,
}

impl InMemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, template: RawTemplate) -> Self {
        self.templates.insert(name.into(), template);
        self
    }
}

impl TemplateSource for InMemoryTemplateSource {
    fn load(&self, name: &str) -> Result<RawTemplate, TemplateSourceError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateSourceError::NotFound(name.to_string()))
    }
}
