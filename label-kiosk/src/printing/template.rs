//! Label templates
//!
//! A template is printer markup (ZPL, plain text, ...) with `$name` or
//! `${name}` placeholders. Substitution is safe: a placeholder with no
//! value stays in the output untouched. `$$` produces a literal `$`.

use crate::core::error::{RenderError, RenderResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})")
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplate {
    source: String,
}

impl LabelTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn load(path: &Path) -> RenderResult<Self> {
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|source| RenderError::TemplateRead {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.source) {
            if let Some(m) = caps.get(2).or_else(|| caps.get(3))
                && !names.contains(&m.as_str())
            {
                names.push(m.as_str());
            }
        }
        names
    }

    /// Replace every known placeholder, leave the rest literal
    pub fn substitute(&self, values: &HashMap<&str, String>) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures| {
                if caps.get(1).is_some() {
                    return "$".to_string();
                }
                let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
                match values.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Templates keyed by path, re-read when the file changes on disk
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: HashMap<PathBuf, (Option<SystemTime>, Arc<LabelTemplate>)>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached template for `path`, loading it on first use or after an edit
    ///
    /// A missing file is an error even if an older copy is cached.
    pub fn get(&mut self, path: &Path) -> RenderResult<Arc<LabelTemplate>> {
        let modified = std::fs::metadata(path)
            .map_err(|source| RenderError::TemplateRead {
                path: path.to_path_buf(),
                source,
            })?
            .modified()
            .ok();

        if let Some((cached_at, template)) = self.entries.get(path)
            && modified.is_some()
            && *cached_at == modified
        {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(LabelTemplate::load(path)?);
        debug!(template = %path.display(), "Label template loaded");
        self.entries
            .insert(path.to_path_buf(), (modified, Arc::clone(&template)));
        Ok(template)
    }
}
