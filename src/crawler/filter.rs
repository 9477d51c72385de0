//! Result filtering for the jurisprudence search
//!
//! Only official court and government hosts survive. Aggregators and links
//! to binary documents are dropped, since deep fetch cannot read them.

use url::Url;

use crate::core::{PilotError, Result, SearchResult};

/// Host suffixes of official sources
pub const OFFICIAL_SUFFIXES: &[&str] = &["jus.br", "gov.br"];

/// Aggregator sites rejected even when they mirror official content
pub const BLOCKED_AGGREGATORS: &[&str] = &["jusbrasil", "escavador", "conjur"];

/// Upper bound on results deep-fetched per search; configuration may only lower it
pub const MAX_DEEP_RESULTS: usize = 3;

/// Path suffixes of documents deep fetch cannot extract from
pub const DOCUMENT_SUFFIXES: &[&str] = &[".pdf", ".doc", ".docx", ".odt", ".rtf"];

/// Build the search URL; the domain qualifier goes into the query text itself
pub fn search_url(endpoint: &str, query: &str, qualifier: &str) -> Result<String> {
    let q = format!("{} {}", query.trim(), qualifier).trim().to_string();
    Url::parse_with_params(endpoint, &[("q", q.as_str())])
        .map(String::from)
        .map_err(|e| PilotError::config(format!("Invalid search endpoint '{}': {}", endpoint, e)))
}

fn host_matches_suffix(host: &str, suffix: &str) -> bool {
    host == suffix
        || host
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

/// Whether `url` is served by a blacklisted aggregator
pub fn is_blocked(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let host = Url::parse(&lower)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or(lower);
    BLOCKED_AGGREGATORS.iter().any(|b| host.contains(b))
}

/// Whether `url` points at a document file rather than a page
///
/// Both the path and the whole URL without its fragment are checked, so
/// download endpoints like `?arquivo=acordao.pdf` count as documents.
pub fn is_document(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let mut whole = url.clone();
    whole.set_fragment(None);
    let whole = whole.as_str().to_ascii_lowercase();
    DOCUMENT_SUFFIXES
        .iter()
        .any(|s| path.ends_with(s) || whole.ends_with(s))
}

/// Whether `url` is an official, non-aggregator HTML page
pub fn is_official(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
        return false;
    };

    OFFICIAL_SUFFIXES
        .iter()
        .any(|suffix| host_matches_suffix(&host, suffix))
        && !is_blocked(url)
        && !is_document(&parsed)
}

/// Keep official results, in order, up to `limit` (capped at [`MAX_DEEP_RESULTS`])
pub fn filter_official(raw: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    raw.into_iter()
        .filter(|r| is_official(&r.url))
        .take(limit.min(MAX_DEEP_RESULTS))
        .collect()
}

/// Single informational result returned when nothing official survives
pub fn no_official_result(search_url: &str) -> SearchResult {
    SearchResult::new(
        "No official results found",
        search_url,
        "The search returned no pages from official court or government domains \
         (.jus.br / .gov.br). Try rephrasing the query or searching the court's site directly.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchResult {
        SearchResult::new("t", url, "s")
    }

    #[test]
    fn test_search_url_appends_qualifier_to_query() {
        let url = search_url("https://www.google.com/search", "dano moral", "site:jus.br").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let q: Vec<_> = parsed.query_pairs().collect();
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].1, "dano moral site:jus.br");
    }

    #[test]
    fn test_official_hosts() {
        assert!(is_official("https://www.stj.jus.br/sites/portalp/Paginas/Comunicacao"));
        assert!(is_official("https://jus.br/"));
        assert!(is_official("http://www.planalto.gov.br/ccivil_03/leis/l8078.htm"));
        assert!(!is_official("https://notjus.br/"));
        assert!(!is_official("https://example.com/?ref=tj.jus.br"));
        assert!(!is_official("ftp://files.tjsp.jus.br/a.html"));
    }

    #[test]
    fn test_documents_and_aggregators_are_excluded() {
        let raw = vec![
            hit("https://www.tjsp.jus.br/files/acordao.PDF"),
            hit("https://www.jusbrasil.com.br/jurisprudencia/123"),
            hit("https://portal.stf.jus.br/noticias/verNoticiaDetalhe.asp?idConteudo=1"),
        ];
        let kept = filter_official(raw, 3);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].url.contains("stf.jus.br"));
    }

    #[test]
    fn test_document_named_in_query_is_excluded() {
        assert!(!is_official("https://x.jus.br/download?arquivo=acordao.pdf"));
        assert!(!is_official("https://x.jus.br/baixar?id=7&nome=Voto.DOCX#p2"));
        assert!(is_official("https://x.jus.br/consulta?tipo=pdf"));
    }

    #[test]
    fn test_limit_never_exceeds_deep_result_cap() {
        let raw = (1..=8)
            .map(|i| hit(&format!("https://tj{}.jus.br/", i)))
            .collect();
        assert_eq!(filter_official(raw, 8).len(), MAX_DEEP_RESULTS);
    }

    #[test]
    fn test_aggregator_under_official_looking_host_is_blocked() {
        assert!(!is_official("https://jusbrasil.jus.br/x"));
    }

    #[test]
    fn test_limit_preserves_order() {
        let raw = (1..=5)
            .map(|i| hit(&format!("https://tj{}.jus.br/", i)))
            .collect();
        let kept = filter_official(raw, 3);
        let urls: Vec<_> = kept.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://tj1.jus.br/", "https://tj2.jus.br/", "https://tj3.jus.br/"]
        );
    }
}
