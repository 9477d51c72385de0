//! Page scripts and text shaping for the crawler

use serde::Deserialize;
use serde_json::Value;

use crate::core::{truncate_chars, PilotError, Result, SearchResult};
use crate::crawler::filter::BLOCKED_AGGREGATORS;

/// Main-content candidates, most specific first
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#conteudo",
    ".conteudo",
    "#content",
    ".content",
    ".texto",
    "#texto",
];

/// A candidate node must carry more text than this to be accepted
pub const MIN_CONTENT_CHARS: usize = 200;

const FULL_PAGE_MARKER: &str = "[Full page] ";

/// Scrape result entries from a rendered search page
///
/// Aggregators are dropped here as a first pass; the caller filters again.
pub fn search_results_script() -> String {
    let blocked = serde_json::to_string(BLOCKED_AGGREGATORS).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  const blocked = {blocked};
  const out = [];
  document.querySelectorAll('div.g, div.MjjYud, div[data-hveid]').forEach((c) => {{
    const a = c.querySelector('a[href^="http"]');
    const h = c.querySelector('h3');
    if (!a || !h) return;
    const url = a.href;
    if (blocked.some((b) => url.includes(b))) return;
    if (out.some((r) => r.url === url)) return;
    const s = c.querySelector('.VwiC3b, [data-sncf], .IsZvec, span.st');
    out.push({{ title: h.innerText.trim(), url, snippet: s ? s.innerText.trim() : '' }});
  }});
  return out;
}})()"#
    )
}

/// Text of the first content node long enough to be the article, else the body
pub fn content_script() -> String {
    let selectors = serde_json::to_string(CONTENT_SELECTORS).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  const selectors = {selectors};
  for (const sel of selectors) {{
    const el = document.querySelector(sel);
    if (el && el.innerText && el.innerText.trim().length > {min}) return el.innerText;
  }}
  return document.body ? document.body.innerText : '';
}})()"#,
        min = MIN_CONTENT_CHARS
    )
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

/// Decode the scraped list; entries without a URL are dropped
pub fn parse_results(value: Value) -> Result<Vec<SearchResult>> {
    let raw: Vec<RawResult> = serde_json::from_value(value)
        .map_err(|e| PilotError::ExtractionFailed(format!("unexpected search results: {}", e)))?;
    Ok(raw
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| SearchResult::new(r.title, r.url, r.snippet))
        .collect())
}

/// Collapse all whitespace runs to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and bound page text; empty pages are an extraction failure
pub fn page_excerpt(value: &Value, max_chars: usize) -> Result<String> {
    let text = value
        .as_str()
        .ok_or_else(|| PilotError::ExtractionFailed("page returned no text".to_string()))?;
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Err(PilotError::ExtractionFailed("page has no text".to_string()));
    }
    Ok(truncate_chars(&normalized, max_chars).to_string())
}

/// Snippet replaced by the page excerpt
pub fn enriched_snippet(excerpt: &str) -> String {
    format!("{}{}", FULL_PAGE_MARKER, excerpt)
}

/// Original snippet with a note that the full page could not be read
pub fn degraded_snippet(original: &str, error: &PilotError) -> String {
    format!("{} [deep fetch failed: {}]", original, error)
}

/// Whether a snippet came from the full page
pub fn is_enriched(snippet: &str) -> bool {
    snippet.starts_with(FULL_PAGE_MARKER)
}
