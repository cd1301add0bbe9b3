//! Content extractor: page markup to clean text plus absolute links
//!
//! This module handles:
//! - Dropping non-content elements (scripts, styles, navigation, forms, frames) and comments
//! - Rendering table rows as ` | `-separated lines and list items as `- ` lines
//! - Resolving hyperlinks against the page URL
//! - Deduplicating links, keeping download links ahead of page links, capped at 50

use crate::crawler::MAX_LINKS;
use crate::url::{is_download_url, normalize_url};
use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use url::Url;

/// Elements whose whole subtree is dropped, links included
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form",
    "iframe", "frame", "frameset", "object", "embed", "svg", "canvas", "button", "input",
    "select", "textarea",
];

/// Elements that start and end a line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "body", "caption", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "html", "main", "ol", "p",
    "section", "summary", "table", "tbody", "tfoot", "thead", "title", "ul",
];

/// Elements followed by a blank line
const PARAGRAPH_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "table", "ul", "ol", "dl", "section", "article",
];

/// Clean text and links of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub clean_text: String,

    /// Absolute, fragment-free, deduplicated by normalized form, at most 50
    pub links: Vec<String>,

    /// True once the text has been cut down to a budget
    pub truncated: bool,
}

/// Extractor output: the content and whether the markup was usable at all
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub content: PageContent,
    pub usable: bool,
}

/// Extracts clean text and links from page markup
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` outside of skipped elements, resolved against `base_url`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, `data:` and bare `#fragment` links
/// - Non-HTTP(S) URLs after resolution
/// - With `same_domain_only`, page links whose host differs from the base host
///   (download links are kept regardless of host)
///
/// # Arguments
///
/// * `html` - Raw page markup
/// * `base_url` - URL the page was fetched from
/// * `same_domain_only` - Drop page links to other hosts
///
/// # Returns
///
/// An `Extraction`; `usable` is false (and the content empty) when the
/// markup is empty or binary.
///
/// # Example
///
/// ```
/// use crawl_agent::crawler::extract_page;
/// use url::Url;
///
/// let html = r#"<html><body><nav><a href="/home">Home</a></nav>
///     <p>Graphs</p><a href="files/g.csv">g</a></body></html>"#;
/// let base = Url::parse("https://example.com/data/").unwrap();
/// let page = extract_page(html, &base, true);
/// assert!(page.usable);
/// assert_eq!(page.content.links, vec!["https://example.com/data/files/g.csv"]);
/// ```
pub fn extract_page(html: &str, base_url: &Url, same_domain_only: bool) -> Extraction {
    if html.trim().is_empty() || html.contains('\0') {
        return Extraction {
            content: PageContent::default(),
            usable: false,
        };
    }

    let document = Html::parse_document(html);

    let mut walker = TextWalker::new(base_url);
    walker.walk(document.root_element());
    walker.visit_end();
    let (lines, raw_links) = walker.finish();

    Extraction {
        content: PageContent {
            clean_text: join_lines(&lines),
            links: select_links(raw_links, base_url, same_domain_only),
            truncated: false,
        },
        usable: true,
    }
}

/// Collects text lines and raw link targets in document order
struct TextWalker<'a> {
    base_url: &'a Url,
    lines: Vec<String>,
    current: String,
    pending_space: bool,
    links: Vec<String>,
}

impl<'a> TextWalker<'a> {
    fn new(base_url: &'a Url) -> Self {
        Self {
            base_url,
            lines: Vec::new(),
            current: String::new(),
            pending_space: false,
            links: Vec::new(),
        }
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.visit(child_element);
                    }
                }
                // comments, doctypes and processing instructions carry no content
                _ => {}
            }
        }
    }

    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();

        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }

        if name == "a" {
            if let Some(href) = element.value().attr("href") {
                if let Some(link) = resolve_link(href, self.base_url) {
                    self.links.push(link);
                }
            }
        }

        match name {
            "br" => self.flush(),
            "tr" => self.visit_row(element),
            "li" => {
                self.flush();
                self.current.push_str("- ");
                self.walk(element);
                self.flush();
            }
            "pre" => self.visit_preformatted(element),
            _ if BLOCK_ELEMENTS.contains(&name) => {
                self.flush();
                self.walk(element);
                self.flush();
                if PARAGRAPH_ELEMENTS.contains(&name) {
                    self.visit_end();
                }
            }
            _ => self.walk(element),
        }
    }

    /// Renders a table row as one line of ` | `-separated cells
    fn visit_row(&mut self, row: ElementRef<'_>) {
        self.flush();

        let mut cells = Vec::new();
        for child in row.children().filter_map(ElementRef::wrap) {
            let name = child.value().name();
            if name != "td" && name != "th" {
                continue;
            }

            let mut cell = TextWalker::new(self.base_url);
            cell.walk(child);
            let (lines, links) = cell.finish();
            self.links.extend(links);
            cells.push(lines.join(" "));
        }

        if cells.iter().any(|c| !c.trim().is_empty()) {
            self.lines.push(cells.join(" | "));
        }
    }

    /// Keeps the line structure of preformatted text
    fn visit_preformatted(&mut self, pre: ElementRef<'_>) {
        self.flush();

        for node in pre.descendants() {
            if let Some(element) = ElementRef::wrap(node) {
                if element.value().name() == "a" {
                    if let Some(link) = element
                        .value()
                        .attr("href")
                        .and_then(|href| resolve_link(href, self.base_url))
                    {
                        self.links.push(link);
                    }
                }
            }
        }

        let text: String = pre.text().collect();
        for line in text.lines() {
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if !line.is_empty() {
                self.lines.push(line);
            }
        }
        self.visit_end();
    }

    fn push_text(&mut self, text: &str) {
        let starts_with_space = text.starts_with(char::is_whitespace);
        let words: Vec<&str> = text.split_whitespace().collect();

        if words.is_empty() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }

        let needs_separator = !self.current.is_empty() && !self.current.ends_with(' ');
        if needs_separator && (starts_with_space || self.pending_space) {
            self.current.push(' ');
        }

        self.current.push_str(&words.join(" "));
        self.pending_space = text.ends_with(char::is_whitespace);
    }

    fn flush(&mut self) {
        let line = self.current.trim();
        if !line.is_empty() && line != "-" {
            self.lines.push(line.to_string());
        }
        self.current.clear();
        self.pending_space = false;
    }

    /// Ends a paragraph-like block with a single blank line
    fn visit_end(&mut self) {
        self.flush();
        if matches!(self.lines.last(), Some(last) if !last.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn finish(mut self) -> (Vec<String>, Vec<String>) {
        self.flush();
        (self.lines, self.links)
    }
}

/// Joins lines, collapsing blank runs to one and trimming the ends
fn join_lines(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.is_empty() && matches!(out.last(), Some(last) if last.is_empty()) {
            continue;
        }
        out.push(line);
    }

    out.join("\n").trim().to_string()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs and same-page `#fragment` links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    Some(url.to_string())
}

/// Deduplicates by normalized form, applies the same-domain rule, and keeps
/// download links first
fn select_links(raw: Vec<String>, base_url: &Url, same_domain_only: bool) -> Vec<String> {
    let base_host = base_url.host_str().map(|h| h.to_lowercase());
    let mut seen = HashSet::new();
    let mut downloads = Vec::new();
    let mut pages = Vec::new();

    for link in raw {
        let Ok(key) = normalize_url(&link) else {
            continue;
        };
        if !seen.insert(key) {
            continue;
        }

        if is_download_url(&link) {
            downloads.push(link);
            continue;
        }

        if same_domain_only {
            let host = Url::parse(&link)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()));
            if host != base_host {
                continue;
            }
        }
        pages.push(link);
    }

    downloads.into_iter().chain(pages).take(MAX_LINKS).collect()
}
