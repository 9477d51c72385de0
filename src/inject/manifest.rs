//! Content-script manifest and URL pattern matching

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{PilotError, Result};

/// Manifest listing which files to inject into which pages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub content_scripts: Vec<ScriptInjectionRule>,
}

/// One content-script rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptInjectionRule {
    /// URL globs; `*` matches any character sequence
    #[serde(default)]
    pub matches: Vec<String>,
    /// Stylesheets, relative to the extension directory
    #[serde(default)]
    pub css: Vec<String>,
    /// Scripts, relative to the extension directory
    #[serde(default)]
    pub js: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read and parse a manifest file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PilotError::config(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Rules with at least one pattern matching `url`, in manifest order
    pub fn rules_for<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a ScriptInjectionRule> {
        self.content_scripts.iter().filter(move |rule| rule.matches_url(url))
    }
}

impl ScriptInjectionRule {
    /// Whether any pattern matches the whole URL
    pub fn matches_url(&self, url: &str) -> bool {
        self.matches.iter().any(|pattern| match compile_glob(pattern) {
            Ok(re) => re.is_match(url),
            Err(e) => {
                tracing::warn!(pattern = %pattern, "ignoring invalid match pattern: {}", e);
                false
            }
        })
    }
}

/// Compile a URL glob into an anchored regex
///
/// Every character other than `*` is literal; `*` matches any sequence,
/// including the empty one.
pub fn compile_glob(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body))
        .map_err(|e| PilotError::config(format!("Invalid match pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_matches_subpaths() {
        let re = compile_glob("https://example.com/*").unwrap();
        assert!(re.is_match("https://example.com/anything/here"));
        assert!(re.is_match("https://example.com/"));
        assert!(!re.is_match("https://other.com/"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let re = compile_glob("https://pje.tjsp.jus.br/pje/*?x=1").unwrap();
        assert!(re.is_match("https://pje.tjsp.jus.br/pje/painel?x=1"));
        // '.' and '?' are literal
        assert!(!re.is_match("https://pjeXtjsp.jus.br/pje/painel?x=1"));
        assert!(!re.is_match("https://pje.tjsp.jus.br/pje/painelx=1"));
    }

    #[test]
    fn test_glob_is_anchored() {
        let re = compile_glob("https://*.jus.br/").unwrap();
        assert!(re.is_match("https://esaj.tjsp.jus.br/"));
        assert!(!re.is_match("https://esaj.tjsp.jus.br/extra"));
        assert!(!re.is_match("xhttps://a.jus.br/"));
    }

    #[test]
    fn test_manifest_rules_for() {
        let manifest = Manifest::from_json(
            r#"{"content_scripts": [
                {"matches": ["https://example.com/*"], "css": ["a.css"], "js": ["a.js"]},
                {"matches": ["https://other.com/*"], "js": ["b.js"]}
            ]}"#,
        )
        .unwrap();
        let matched: Vec<_> = manifest
            .rules_for("https://example.com/anything/here")
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].js, vec!["a.js".to_string()]);
        assert!(manifest.rules_for("https://nowhere.org/").next().is_none());
    }
}
