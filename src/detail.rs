use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

use crate::models::Listing;

pub const NOT_PROVIDED: &str = "Not Provided";

/// Everything the detail overlay (or `show`) needs, already reduced to plain
/// text.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub title: String,
    pub fields: Vec<(&'static str, String)>,
    pub description: Vec<String>,
    pub apply_url: String,
}

impl DetailView {
    pub fn new(listing: &Listing, via: &str, width: usize) -> Self {
        let mut fields = vec![
            ("Company", or_not_provided(Some(listing.company_name.as_str()))),
            ("Category", or_not_provided(listing.category.as_deref())),
            ("Salary", or_not_provided(listing.salary.as_deref())),
            ("Job type", or_not_provided(listing.job_type.as_deref().map(humanize_job_type).as_deref())),
            ("Location", or_not_provided(listing.location.as_deref())),
            ("Published", format_published(listing.published)),
        ];
        if let Some(logo) = &listing.company_logo {
            fields.push(("Logo", logo.clone()));
        }
        if !listing.tags.is_empty() {
            fields.push(("Tags", listing.tags.join(", ")));
        }

        Self {
            title: listing.title.clone(),
            fields,
            description: render_description(&listing.description, width),
            apply_url: apply_url(listing, via),
        }
    }
}

/// Canonical URL with the referral tag appended.
pub fn apply_url(listing: &Listing, via: &str) -> String {
    let separator = if listing.url.contains('?') { '&' } else { '?' };
    format!("{}{}via={}", listing.url, separator, via)
}

pub fn or_not_provided(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_PROVIDED.to_string(),
    }
}

/// "May 10, 2024, 13:12:05"
pub fn format_published(published: Option<NaiveDateTime>) -> String {
    match published {
        Some(dt) => dt.format("%B %-d, %Y, %H:%M:%S").to_string(),
        None => NOT_PROVIDED.to_string(),
    }
}

fn humanize_job_type(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turn upstream HTML into wrapped plain-text lines. Only text nodes make it
/// through; markup, scripts and styles never reach the terminal.
pub fn render_description(html: &str, width: usize) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut renderer = TextRenderer::new();
    renderer.walk(fragment.root_element());
    renderer.flush();

    let width = width.max(10);
    let mut lines = Vec::new();
    for block in renderer.blocks {
        if block.is_empty() {
            if lines.last().is_some_and(|l: &String| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        let options = if block.starts_with(BULLET) {
            textwrap::Options::new(width).subsequent_indent("  ")
        } else {
            textwrap::Options::new(width)
        };
        lines.extend(textwrap::wrap(&block, options).into_iter().map(|l| l.into_owned()));
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

const BULLET: &str = "• ";

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "blockquote", "pre", "table", "tr",
    "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
];

const SPACED_TAGS: &[&str] = &[
    "p", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "hr",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "iframe", "object"];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

struct TextRenderer {
    blocks: Vec<String>,
    current: String,
}

impl TextRenderer {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: String::new(),
        }
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(el) = ElementRef::wrap(child) {
                let name = el.value().name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                match name {
                    "br" => self.flush(),
                    "li" => {
                        self.flush();
                        self.current.push_str(BULLET);
                        self.walk(el);
                        self.flush();
                    }
                    _ if BLOCK_TAGS.contains(&name) => {
                        self.flush();
                        self.walk(el);
                        self.flush();
                        if SPACED_TAGS.contains(&name) {
                            self.gap();
                        }
                    }
                    _ => self.walk(el),
                }
            } else if let Node::Text(text) = child.value() {
                let collapsed = WHITESPACE.replace_all(text, " ");
                if self.current.is_empty() || self.current.ends_with(' ') {
                    self.current.push_str(collapsed.trim_start());
                } else {
                    self.current.push_str(&collapsed);
                }
            }
        }
    }

    fn flush(&mut self) {
        let line = self.current.trim();
        if !line.is_empty() && line != BULLET.trim() {
            self.blocks.push(line.to_string());
        }
        self.current.clear();
    }

    fn gap(&mut self) {
        if self.blocks.last().is_some_and(|b| !b.is_empty()) {
            self.blocks.push(String::new());
        }
    }
}
