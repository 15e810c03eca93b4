//! Loading, hashing, rendering, and versioning of prompt templates (§4.B).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::source::{RawTemplate, TemplateFrontmatter, TemplateSource, TemplateSourceError};

#[derive(Debug, Clone)]
pub struct LoadedPrompt {
    pub content: String,
    pub content_hash: String,
    pub frontmatter: TemplateFrontmatter,
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Source(#[from] TemplateSourceError),
    #[error("prompt_render_error: undeclared variable `{0}` in template")]
    UndeclaredVariable(String),
    #[error("prompt_render_error: declared variable `{0}` was not substituted")]
    MissingSubstitution(String),
    #[error("no historical hash {0} found for prompt {1}")]
    UnknownHash(String, String),
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    hash: String,
    content: String,
    frontmatter: TemplateFrontmatter,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct PromptHistory {
    active_hash: Option<String>,
    entries: Vec<HistoryEntry>,
}

/// Content hash: first 16 hex chars of SHA-256, matching §4.B
/// (`contentHash = SHA256(content)[0:16]`).
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let full_hex = format!("{:x}", digest);
    full_hex[..16].to_string()
}

/// Loads, hashes, renders, and versions prompt templates (§4.B).
pub struct PromptRegistry {
    source: Arc<dyn TemplateSource>,
    history: RwLock<HashMap<String, PromptHistory>>,
}

impl PromptRegistry {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// `loadPrompt(name)`: returns content + hash + frontmatter (§4.B). The
    /// first load of a given name seeds its version history as the active
    /// hash; subsequent loads that hit the same content return the same
    /// hash (deduplication), and a changed source content is treated as a
    /// new version save.
    pub fn load_prompt(&self, name: &str) -> Result<LoadedPrompt, PromptError> {
        let raw: RawTemplate = self.source.load(name)?;
        let hash = content_hash(&raw.content);

        let mut history = self.history.write().unwrap();
        let entry = history.entry(name.to_string()).or_default();
        if !entry.entries.iter().any(|e| e.hash == hash) {
            entry.entries.push(HistoryEntry {
                hash: hash.clone(),
                content: raw.content.clone(),
                frontmatter: raw.frontmatter.clone(),
                saved_at: Utc::now(),
            });
            entry.active_hash = Some(hash.clone());
        }

        Ok(LoadedPrompt {
            content: raw.content,
            content_hash: hash,
            frontmatter: raw.frontmatter,
        })
    }

    /// `render(content, vars)`: substitutes `${var}` and rejects any
    /// undeclared variable (§4.B). A variable present in `vars` but never
    /// referenced in `content` is tolerated (extra context is harmless); a
    /// `${var}` left in the output after substitution means the caller
    /// forgot to supply a declared variable, which is also an error.
    pub fn render(
        &self,
        content: &str,
        vars: &HashMap<String, String>,
    ) -> Result<String, PromptError> {
        let mut rendered = String::with_capacity(content.len());
        let mut cursor = 0usize;

        while let Some(start) = content[cursor..].find("${") {
            let abs_start = cursor + start;
            rendered.push_str(&content[cursor..abs_start]);
            let Some(end_rel) = content[abs_start + 2..].find('}') else {
                // Unterminated placeholder: emit literally, nothing more to parse.
                rendered.push_str(&content[abs_start..]);
                cursor = content.len();
                break;
            };
            let var_name = &content[abs_start + 2..abs_start + 2 + end_rel];
            match vars.get(var_name) {
                Some(value) => rendered.push_str(value),
                None => return Err(PromptError::UndeclaredVariable(var_name.to_string())),
            }
            cursor = abs_start + 2 + end_rel + 1;
        }
        rendered.push_str(&content[cursor..]);
        Ok(rendered)
    }

    /// Saving a new template version deactivates the prior hash and
    /// retains full history (§4.B).
    pub fn save_version(
        &self,
        name: &str,
        content: String,
        frontmatter: TemplateFrontmatter,
    ) -> String {
        let hash = content_hash(&content);
        let mut history = self.history.write().unwrap();
        let entry = history.entry(name.to_string()).or_default();
        entry.entries.push(HistoryEntry {
            hash: hash.clone(),
            content,
            frontmatter,
            saved_at: Utc::now(),
        });
        entry.active_hash = Some(hash.clone());
        hash
    }

    /// Rollback = activate any historical hash (§4.B).
    pub fn rollback(&self, name: &str, hash: &str) -> Result<(), PromptError> {
        let mut history = self.history.write().unwrap();
        let entry = history
            .get_mut(name)
            .ok_or_else(|| PromptError::UnknownHash(hash.to_string(), name.to_string()))?;
        if !entry.entries.iter().any(|e| e.hash == hash) {
            return Err(PromptError::UnknownHash(hash.to_string(), name.to_string()));
        }
        entry.active_hash = Some(hash.to_string());
        Ok(())
    }

    pub fn active_hash(&self, name: &str) -> Option<String> {
        self.history.read().unwrap().get(name)?.active_hash.clone()
    }

    pub fn history_len(&self, name: &str) -> usize {
        self.history
            .read()
            .unwrap()
            .get(name)
            .map(|h| h.entries.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryTemplateSource;

    fn template(content: &str) -> RawTemplate {
        RawTemplate {
            content: content.to_string(),
            frontmatter: TemplateFrontmatter {
                version: 1,
                pipeline: "cb".to_string(),
                variables: vec!["claim".to_string()],
                required_sections: vec![],
            },
        }
    }

    #[test]
    fn identical_content_yields_identical_hash() {
        let a = content_hash("hello world");
        let b = content_hash("hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn render_substitutes_declared_variables() {
        let source = InMemoryTemplateSource::new()
            .with_template("claim.refine", template("Refine: ${claim}"));
        let registry = PromptRegistry::new(Arc::new(source));
        let loaded = registry.load_prompt("claim.refine").unwrap();

        let mut vars = HashMap::new();
        vars.insert("claim".to_string(), "the sky is blue".to_string());
        let rendered = registry.render(&loaded.content, &vars).unwrap();
        assert_eq!(rendered, "Refine: the sky is blue");
    }

    #[test]
    fn render_rejects_undeclared_variable() {
        let source = InMemoryTemplateSource::new()
            .with_template("claim.refine", template("Refine: ${claim} at ${time}"));
        let registry = PromptRegistry::new(Arc::new(source));
        let loaded = registry.load_prompt("claim.refine").unwrap();

        let mut vars = HashMap::new();
        vars.insert("claim".to_string(), "x".to_string());
        let err = registry.render(&loaded.content, &vars).unwrap_err();
        assert!(matches!(err, PromptError::UndeclaredVariable(v) if v == "time"));
    }

    #[test]
    fn save_version_deactivates_prior_hash_but_keeps_history() {
        let source = InMemoryTemplateSource::new()
            .with_template("claim.refine", template("v1 ${claim}"));
        let registry = PromptRegistry::new(Arc::new(source));
        let first = registry.load_prompt("claim.refine").unwrap();

        let second_hash = registry.save_version(
            "claim.refine",
            "v2 ${claim}".to_string(),
            TemplateFrontmatter {
                version: 2,
                pipeline: "cb".to_string(),
                variables: vec!["claim".to_string()],
                required_sections: vec![],
            },
        );

        assert_ne!(first.content_hash, second_hash);
        assert_eq!(registry.active_hash("claim.refine").unwrap(), second_hash);
        assert_eq!(registry.history_len("claim.refine"), 2);

        registry.rollback("claim.refine", &first.content_hash).unwrap();
        assert_eq!(registry.active_hash("claim.refine").unwrap(), first.content_hash);
    }
}
