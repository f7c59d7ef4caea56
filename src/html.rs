//! HTML helpers built on `scraper`: content-region text and link discovery.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Elements whose text never counts as page content.
const IGNORED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Compiled content-region selectors.
pub struct ContentSelectors {
    selectors: Vec<Selector>,
}

impl ContentSelectors {
    /// Compiles CSS selectors, returning the first one that fails to parse.
    pub fn parse<S: AsRef<str>>(patterns: &[S]) -> Result<Self, String> {
        let selectors = patterns
            .iter()
            .map(|p| Selector::parse(p.as_ref()).map_err(|_| p.as_ref().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }
}

/// Visible text inside any element matched by `selectors`.
///
/// The regions are unioned: a text node nested in several matching
/// elements (a `p` inside `main`) is taken once, and nodes are emitted in
/// document order. Whitespace runs collapse to a single space.
pub fn extract_content_text(document: &Html, selectors: &ContentSelectors) -> String {
    let regions: HashSet<_> = selectors
        .selectors
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(|el| el.id())
        .collect();
    if regions.is_empty() {
        return String::new();
    }

    let mut raw = String::new();
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let mut in_region = false;
        let mut ignored = false;
        for ancestor in node.ancestors() {
            if let Some(el) = ancestor.value().as_element() {
                if IGNORED_ELEMENTS.contains(&el.name()) {
                    ignored = true;
                    break;
                }
            }
            if regions.contains(&ancestor.id()) {
                in_region = true;
            }
        }
        if in_region && !ignored {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}

/// Every `a[href]` target resolved against `base`, fragment removed.
///
/// Non-HTTP(S) targets (`mailto:`, `javascript:`) are dropped.
pub fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
