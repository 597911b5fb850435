//! Search endpoint client and search result parser.
//!
//! The provider GETs a configured URL template (`{query}` is replaced with
//! the encoded query) and returns the body untouched. The parser pulls
//! `(title, link)` pairs out of that text: HTML result anchors, including
//! DuckDuckGo `uddg` redirect links, and `title: ..., link: ...` records.

use std::collections::HashSet;
use std::sync::LazyLock;

use mealflow_core::collaborators::{RecipeParser, SearchProvider};
use mealflow_types::error::CollaboratorError;
use mealflow_types::state::MealOption;
use regex::Regex;
use reqwest::Url;

use super::{status_error, transport_error};

const QUERY_PLACEHOLDER: &str = "{query}";

/// Sites folded into one query; longer filters get truncated by engines.
const MAX_SITE_FILTERS: usize = 4;

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).expect("valid regex")
});

static TEXT_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:snippet:\s*(.*?),\s*)?title:\s*(.*?),\s*link:\s*(https?://[^\s,\]]+)")
        .expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct HttpSearchProvider {
    client: reqwest::Client,
    template: String,
    timeout_secs: u64,
}

impl HttpSearchProvider {
    /// Fails if the template has no `{query}` slot or is not a valid URL.
    pub fn new(client: reqwest::Client, template: &str) -> Result<Self, CollaboratorError> {
        if !template.contains(QUERY_PLACEHOLDER) {
            return Err(CollaboratorError::Unavailable(format!(
                "search endpoint has no {QUERY_PLACEHOLDER} placeholder: {template}"
            )));
        }
        Url::parse(&template.replace(QUERY_PLACEHOLDER, "test"))
            .map_err(|e| CollaboratorError::Unavailable(format!("invalid search endpoint {template}: {e}")))?;

        Ok(Self {
            client,
            template: template.to_string(),
            timeout_secs: 30,
        })
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Endpoint URL for a query with optional site filters.
    pub fn request_url(&self, query: &str, sources: &[String]) -> String {
        let full = with_site_filters(query, sources);
        self.template.replace(QUERY_PLACEHOLDER, &encode_component(&full))
    }
}

impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, sources: &[String]) -> Result<String, CollaboratorError> {
        let url = self.request_url(query, sources);
        tracing::debug!(query = %query, sources = sources.len(), "searching");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(&url, status));
        }
        response
            .text()
            .await
            .map_err(|e| transport_error(&url, self.timeout_secs, e))
    }
}

/// `"{query} site:a OR site:b"` for up to four sources.
pub fn with_site_filters(query: &str, sources: &[String]) -> String {
    let sites: Vec<String> = sources
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(MAX_SITE_FILTERS)
        .map(|s| format!("site:{s}"))
        .collect();
    if sites.is_empty() {
        query.to_string()
    } else {
        format!("{query} {}", sites.join(" OR "))
    }
}

/// Percent-encode a query component (form style, spaces as `+`).
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Extracts recipe candidates from raw search output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchResultParser;

impl RecipeParser for SearchResultParser {
    async fn parse(&self, raw_results: &str, cuisine: &str) -> Result<Vec<MealOption>, CollaboratorError> {
        Ok(parse_results(raw_results, cuisine))
    }
}

/// Parse both result formats, keeping the first occurrence of each link.
pub fn parse_results(raw: &str, cuisine: &str) -> Vec<MealOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();

    let mut push = |title: String, link: String, description: String| {
        if title.is_empty() || !seen.insert(link.clone()) {
            return;
        }
        let id = options.len() as u32 + 1;
        options.push(MealOption::new(id, title, description, link));
    };

    for caps in TEXT_RECORD.captures_iter(raw) {
        let snippet = caps.get(1).map(|m| clean_text(m.as_str())).unwrap_or_default();
        let title = clean_text(&caps[2]);
        let link = caps[3].trim_end_matches(['.', ')']).to_string();
        let description = if snippet.is_empty() {
            default_description(cuisine, &link)
        } else {
            snippet
        };
        push(title, link, description);
    }

    for caps in ANCHOR.captures_iter(raw) {
        let Some(link) = resolve_link(&decode_entities(&caps[1])) else {
            continue;
        };
        let title = clean_text(&caps[2]);
        let description = default_description(cuisine, &link);
        push(title, link, description);
    }

    options
}

/// Absolute http(s) target of an anchor, unwrapping search-engine redirects.
fn resolve_link(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(href).ok()?;

    if let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg") {
        let target = Url::parse(&target).ok()?;
        return is_result_link(&target).then(|| target.to_string());
    }
    is_result_link(&url).then(|| url.to_string())
}

fn is_result_link(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url
            .host_str()
            .is_some_and(|host| !host.ends_with("duckduckgo.com"))
}

fn default_description(cuisine: &str, link: &str) -> String {
    let host = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()));
    match (cuisine.trim(), host) {
        ("", Some(host)) => format!("Recipe from {host}"),
        (cuisine, Some(host)) => format!("{cuisine} recipe from {host}"),
        (_, None) => "Recipe".to_string(),
    }
}

/// Strip tags, decode entities and collapse whitespace.
pub(crate) fn clean_text(s: &str) -> String {
    let stripped = TAG.replace_all(s, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

pub(crate) fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(template: &str) -> HttpSearchProvider {
        HttpSearchProvider::new(reqwest::Client::new(), template).unwrap()
    }

    #[test]
    fn request_url_encodes_query_and_sites() {
        let p = provider("https://search.example/html/?q={query}");
        let url = p.request_url("thai dinner", &["seriouseats.com".to_string()]);
        assert_eq!(url, "https://search.example/html/?q=thai+dinner+site%3Aseriouseats.com");
    }

    #[test]
    fn site_filters_are_capped() {
        let sources: Vec<String> = ["a.com", "b.com", " ", "c.com", "d.com", "e.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            with_site_filters("ramen recipe", &sources),
            "ramen recipe site:a.com OR site:b.com OR site:c.com OR site:d.com"
        );
        assert_eq!(with_site_filters("ramen recipe", &[]), "ramen recipe");
    }

    #[test]
    fn template_must_have_placeholder() {
        assert!(HttpSearchProvider::new(reqwest::Client::new(), "https://search.example/").is_err());
    }

    #[test]
    fn parses_duckduckgo_html() {
        let html = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.seriouseats.com%2Fpad-thai&amp;rut=abc">Best <b>Pad Thai</b> &amp; More</a>
  <a class="result__url" href="https://duckduckgo.com/settings">settings</a>
</div>
<div class="result">
  <a class="result__a" href="https://hot-thai-kitchen.com/green-curry/">Green Curry</a>
</div>
<a href="https://hot-thai-kitchen.com/green-curry/">Green Curry again</a>
"#;
        let options = parse_results(html, "Thai");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, 1);
        assert_eq!(options[0].name, "Best Pad Thai & More");
        assert_eq!(options[0].recipe_url, "https://www.seriouseats.com/pad-thai");
        assert_eq!(options[0].description, "Thai recipe from seriouseats.com");
        assert_eq!(options[1].id, 2);
        assert_eq!(options[1].recipe_url, "https://hot-thai-kitchen.com/green-curry/");
    }

    #[test]
    fn parses_text_records() {
        let raw = "snippet: Creamy and rich., title: Mushroom Risotto, link: https://recipes.example/risotto, \
                   snippet: Classic., title: Osso Buco, link: https://recipes.example/osso-buco";
        let options = parse_results(raw, "italian");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "Mushroom Risotto");
        assert_eq!(options[0].description, "Creamy and rich.");
        assert_eq!(options[1].recipe_url, "https://recipes.example/osso-buco");
    }

    #[test]
    fn ignores_non_http_links_and_empty_titles() {
        let html = r#"<a href="mailto:a@b.example">Mail</a><a href="https://x.example/r"><img src="x.png"></a>"#;
        assert!(parse_results(html, "").is_empty());
    }

    #[test]
    fn clean_text_collapses_markup() {
        assert_eq!(clean_text("  Tom&nbsp;Yum <em>Soup</em>\n "), "Tom Yum Soup");
    }
}
