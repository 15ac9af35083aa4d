//! Saved web pages: fetching, text extraction and per-directory storage.
//!
//! Layout under the data dir: `pages/<directory key>/index.json` holds the
//! page records; each page body lives next to it as `<url hash>.md`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::SavedPage;

use crate::store::{directory_key, hash_content, read_json, write_json};

/// Elements whose text never reaches the page body.
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template", "svg", "iframe"];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "br", "hr", "li", "ul", "ol",
    "table", "tr", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
];
const ICON_SELECTORS: &[&str] = &[
    r#"link[rel*="icon"]"#,
    r#"link[rel="apple-touch-icon"]"#,
    r#"link[rel="apple-touch-icon-precomposed"]"#,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageRecord {
    url: String,
    title: String,
    token_count: usize,
    favicon: Option<String>,
    fetched_at: String,
}

impl PageRecord {
    fn to_saved(&self) -> SavedPage {
        SavedPage {
            url: self.url.clone(),
            title: self.title.clone(),
            token_count: self.token_count,
            favicon: self.favicon.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
    Plaintext,
}

impl ContentKind {
    /// Unknown or missing content types are treated as HTML.
    pub fn from_header(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/json") || ct.contains("+json") => ContentKind::Json,
            Some(ct) if ct.contains("text/plain") => ContentKind::Plaintext,
            _ => ContentKind::Html,
        }
    }
}

/// A fetched page, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub title: String,
    pub body: String,
    pub favicon: Option<String>,
}

/// Parse `url`, accepting only http(s).
pub fn http_url(url: &str) -> Option<Url> {
    Url::parse(url).ok().filter(|u| matches!(u.scheme(), "http" | "https"))
}

/// `/favicon.ico` at the url's origin.
pub fn favicon_ref(url: &str) -> Option<String> {
    http_url(url)?.join("/favicon.ico").ok().map(String::from)
}

/// First icon the document links to, resolved against `base`.
fn linked_icon(document: &Html, base: &Url) -> Option<String> {
    ICON_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .flat_map(|selector| document.select(&selector).filter_map(|el| el.value().attr("href")).collect::<Vec<_>>())
        .find_map(|href| base.join(href).ok())
        .map(String::from)
}

fn heading_level(tag: &str) -> Option<usize> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let tag = el.name();
                if SKIPPED_TAGS.contains(&tag) {
                    continue;
                }
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    out.push('\n');
                }
                if let Some(level) = heading_level(tag) {
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                } else if tag == "li" {
                    out.push_str("- ");
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

/// Title and readable text of an HTML document. Headings keep their
/// level as `#` markers and list items become `- ` lines.
pub fn extract_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    let lines: Vec<String> = raw
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty() && l != "-")
        .collect();
    (document_title(&document), lines.join("\n"))
}

/// Turn a response body into a stored page. JSON is pretty-printed into a
/// fenced block; plain text is kept as is. Only HTML carries its own title.
pub fn convert_body(url: &Url, kind: ContentKind, body: &[u8]) -> BackendResult<FetchedPage> {
    let fallback_icon = url.join("/favicon.ico").ok().map(String::from);
    match kind {
        ContentKind::Html => {
            let html = String::from_utf8_lossy(body);
            let document = Html::parse_document(&html);
            let favicon = linked_icon(&document, url).or(fallback_icon);
            let (title, text) = extract_text(&html);
            Ok(FetchedPage { title: title.unwrap_or_else(|| url.to_string()), body: text, favicon })
        }
        ContentKind::Json => {
            let value: serde_json::Value = serde_json::from_slice(body)?;
            let pretty = serde_json::to_string_pretty(&value)?;
            Ok(FetchedPage { title: url.to_string(), body: format!("```json\n{}\n```", pretty), favicon: fallback_icon })
        }
        ContentKind::Plaintext => Ok(FetchedPage {
            title: url.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
            favicon: fallback_icon,
        }),
    }
}

pub struct PageFetcher {
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout: Duration::from_secs(timeout_secs) }
    }

    pub fn fetch(&self, url: &str) -> BackendResult<FetchedPage> {
        let parsed = http_url(url).ok_or_else(|| BackendError::Process(format!("not an http(s) url: {}", url)))?;
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BackendError::Process(format!("http client: {}", e)))?;
        let response = client.get(parsed.clone()).send().map_err(|e| BackendError::Io(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Process(format!("{} returned {}", url, status)));
        }
        let kind = ContentKind::from_header(response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));
        let body = response.bytes().map_err(|e| BackendError::Io(e.to_string()))?;
        debug!(url, kind = ?kind, bytes = body.len(), "page fetched");
        convert_body(&parsed, kind, &body)
    }
}

/// Pages saved for one directory.
pub struct PageStore {
    dir: PathBuf,
}

impl PageStore {
    pub fn open(data_dir: &Path, directory: &str) -> Self {
        Self { dir: data_dir.join("pages").join(directory_key(directory)) }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.md", &hash_content(url)[..16]))
    }

    fn load(&self) -> BackendResult<Vec<PageRecord>> {
        read_json(&self.index_path())
    }

    fn store(&self, records: &[PageRecord]) -> BackendResult<()> {
        write_json(&self.index_path(), &records)
    }

    pub fn list(&self) -> BackendResult<Vec<SavedPage>> {
        Ok(self.load()?.iter().map(PageRecord::to_saved).collect())
    }

    /// Insert or replace the page stored for `url`.
    pub fn save(
        &self,
        url: &str,
        title: &str,
        content: &str,
        token_count: usize,
        favicon: Option<String>,
    ) -> BackendResult<SavedPage> {
        let mut records = self.load()?;
        let record = PageRecord {
            url: url.to_string(),
            title: title.to_string(),
            token_count,
            favicon,
            fetched_at: Utc::now().to_rfc3339(),
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(self.body_path(url), content)?;
        match records.iter_mut().find(|r| r.url == url) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.store(&records)?;
        info!(url, tokens = token_count, "page saved");
        Ok(record.to_saved())
    }

    /// Removing an unknown url is not an error.
    pub fn delete(&self, url: &str) -> BackendResult<()> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.url != url);
        if records.len() == before {
            debug!(url, "delete of unknown page");
            return Ok(());
        }
        self.store(&records)?;
        match fs::remove_file(self.body_path(url)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn rename(&self, url: &str, title: &str) -> BackendResult<()> {
        let mut records = self.load()?;
        let record = records.iter_mut().find(|r| r.url == url).ok_or_else(|| BackendError::NotFound(url.to_string()))?;
        record.title = title.to_string();
        self.store(&records)
    }

    /// Bodies of `urls` in the order given; unknown urls are skipped.
    pub fn contents(&self, urls: &[String]) -> BackendResult<Vec<(String, String)>> {
        let records = self.load()?;
        let mut out = Vec::new();
        for url in urls {
            if !records.iter().any(|r| &r.url == url) {
                continue;
            }
            match fs::read_to_string(self.body_path(url)) {
                Ok(body) => out.push((url.clone(), body)),
                Err(e) => debug!(url = %url, error = %e, "page body unreadable"),
            }
        }
        Ok(out)
    }
}
