//! Page scripts used by plan steps and success criteria
//!
//! Every script is a self-invoking expression. Selectors and values are
//! embedded as JSON string literals.

use serde_json::Value;

fn lit(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Scroll into view and click; evaluates to whether the element existed
pub fn click(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
        lit(selector)
    )
}

/// Set an input's value and fire input/change
pub fn fill(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         el.focus(); el.value = {}; \
         el.dispatchEvent(new Event('input', {{bubbles: true}})); \
         el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
        lit(selector),
        lit(value)
    )
}

/// Pick an option by value, falling back to its visible label
pub fn select(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const want = {}; \
         const opt = Array.from(el.options || []).find(o => o.value === want || o.text.trim() === want); \
         el.value = opt ? opt.value : want; \
         el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
        lit(selector),
        lit(value)
    )
}

/// Whether any node matches
pub fn element_present(selector: &str) -> String {
    format!("(() => document.querySelector({}) !== null)()", lit(selector))
}

/// Whether the node exists and is rendered
pub fn element_visible(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const s = getComputedStyle(el); const r = el.getBoundingClientRect(); \
         return s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0; }})()",
        lit(selector)
    )
}

/// Value of a node property, or null when the node is missing
pub fn element_property(selector: &str, property: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return null; \
         const v = el[{}]; return v === undefined ? null : v; }})()",
        lit(selector),
        lit(property)
    )
}

/// Whether the rendered page text contains `text`
pub fn text_present(text: &str) -> String {
    format!(
        "(() => (document.body ? document.body.innerText : '').includes({}))()",
        lit(text)
    )
}

/// Scroll an element into view, or the window by `pixels`
pub fn scroll(selector: Option<&str>, pixels: i64) -> String {
    match selector {
        Some(sel) => format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             el.scrollIntoView({{block: 'center'}}); return true; }})()",
            lit(sel)
        ),
        None => format!("(() => {{ window.scrollBy(0, {}); return true; }})()", pixels),
    }
}

/// Text of a node, or of the whole body
pub fn read_text(selector: Option<&str>) -> String {
    match selector {
        Some(sel) => format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            lit(sel)
        ),
        None => "(() => document.body ? document.body.innerText : '')()".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_escaped() {
        let script = click(r#"a[title="Próximo"]"#);
        assert!(script.contains(r#"document.querySelector("a[title=\"Próximo\"]")"#));
    }

    #[test]
    fn test_scroll_without_selector_uses_pixels() {
        assert!(scroll(None, 500).contains("scrollBy(0, 500)"));
        assert!(scroll(Some("#fim"), 500).contains("scrollIntoView"));
    }
}
