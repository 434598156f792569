use std::collections::HashSet;
use std::sync::Arc;

use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crawlgate_core::bundle::RunBundle;
use crawlgate_core::error::AppError;
use crawlgate_core::models::{Image, Link, Links, Media, PageMetadata};

/// Elements never kept in cleaned output.
const ALWAYS_REMOVED: &[&str] = &["script", "style", "noscript", "template"];

const SOCIAL_MEDIA_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "pinterest.com",
    "tiktok.com",
    "snapchat.com",
    "reddit.com",
];

/// Everything derived from a page's HTML apart from structured extraction.
#[derive(Debug, Clone, Default)]
pub struct CleanedContent {
    pub cleaned_html: String,
    pub markdown: String,
    pub links: Links,
    pub media: Media,
    pub metadata: PageMetadata,
}

/// HTML cleaner and Markdown converter.
///
/// Strips non-content elements plus whatever the run's content options
/// exclude, then converts the remainder to Markdown with htmd.
pub struct ContentCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for ContentCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl ContentCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(ALWAYS_REMOVED.to_vec())
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    pub fn clean(&self, html: &str, base: &Url, run: &RunBundle) -> Result<CleanedContent, AppError> {
        let mut doc = Html::parse_document(html);

        // Metadata lives in <head>, read it before anything is detached.
        let metadata = page_metadata(&doc);

        let mut removals: Vec<Selector> = ALWAYS_REMOVED.iter().filter_map(|t| Selector::parse(t).ok()).collect();
        if let Some(tags) = &run.content.excluded_tags {
            for tag in tags {
                removals.push(parse_selector(tag, "config.excluded_tags")?);
            }
        }
        if let Some(selector) = &run.content.excluded_selector {
            removals.push(parse_selector(selector, "config.excluded_selector")?);
        }
        if run.content.remove_forms == Some(true) {
            removals.push(parse_selector("form", "config.remove_forms")?);
        }
        remove_matching(&mut doc, &removals);

        let scope = run
            .content
            .css_selector
            .as_deref()
            .map(|s| parse_selector(s, "config.css_selector"))
            .transpose()?;
        let scoped: Vec<ElementRef<'_>> = match &scope {
            Some(selector) => doc.select(selector).collect(),
            None => vec![doc.root_element()],
        };

        let cleaned_html = scoped.iter().map(|el| el.html()).collect::<Vec<_>>().join("\n");
        let links = collect_links(&scoped, base, run);
        let media = collect_images(&scoped, base, run);

        let markdown = if run.content.only_text == Some(true) {
            scoped.iter().map(|el| plain_text(*el)).collect::<Vec<_>>().join("\n\n")
        } else {
            self.converter
                .convert(&cleaned_html)
                .map_err(|e| AppError::Engine(format!("Markdown conversion failed: {e}")))?
        };

        Ok(CleanedContent {
            cleaned_html,
            markdown,
            links,
            media,
            metadata,
        })
    }
}

impl Default for ContentCleaner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_selector(raw: &str, field: &str) -> Result<Selector, AppError> {
    Selector::parse(raw).map_err(|e| AppError::validation(field, format!("invalid selector '{raw}': {e}")))
}

fn remove_matching(doc: &mut Html, selectors: &[Selector]) {
    let ids: Vec<_> = selectors
        .iter()
        .flat_map(|selector| doc.select(selector).map(|el| el.id()).collect::<Vec<_>>())
        .collect();

    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn plain_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Links and media
// ---------------------------------------------------------------------------

fn collect_links(scoped: &[ElementRef<'_>], base: &Url, run: &RunBundle) -> Links {
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Links::default();
    };
    let opts = &run.links;
    let mut seen = HashSet::new();
    let mut links = Links::default();

    for element in scoped.iter().flat_map(|el| el.select(&anchor)) {
        let Some(href) = element.value().attr("href").and_then(|h| resolve(base, h)) else {
            continue;
        };
        if !seen.insert(href.to_string()) {
            continue;
        }

        let host = href.host_str().unwrap_or_default();
        if opts
            .exclude_domains
            .as_ref()
            .is_some_and(|domains| domains.iter().any(|d| domain_matches(host, d)))
        {
            continue;
        }
        let social = SOCIAL_MEDIA_DOMAINS.iter().any(|d| domain_matches(host, d));
        if social
            && (opts.exclude_social_media_links == Some(true)
                || opts.exclude_social_media_domains == Some(true))
        {
            continue;
        }

        let link = Link {
            href: href.to_string(),
            text: plain_text(element),
        };
        if is_internal(base, &href) {
            links.internal.push(link);
        } else if opts.exclude_external_links != Some(true) {
            links.external.push(link);
        }
    }

    links
}

fn collect_images(scoped: &[ElementRef<'_>], base: &Url, run: &RunBundle) -> Media {
    let Ok(img) = Selector::parse("img[src]") else {
        return Media::default();
    };
    let exclude_external = run.media.exclude_external_images == Some(true);
    let mut seen = HashSet::new();

    let images = scoped
        .iter()
        .flat_map(|el| el.select(&img))
        .filter_map(|element| {
            let src = element.value().attr("src").and_then(|s| resolve(base, s))?;
            if exclude_external && !is_internal(base, &src) {
                return None;
            }
            seen.insert(src.to_string()).then(|| Image {
                src: src.to_string(),
                alt: element.value().attr("alt").unwrap_or_default().trim().to_string(),
            })
        })
        .collect();

    Media { images }
}

/// Absolute http(s) URL for `raw`, or `None` for fragments and other schemes.
fn resolve(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let mut url = base.join(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn is_internal(base: &Url, url: &Url) -> bool {
    let strip = |h: &str| h.trim_start_matches("www.").to_ascii_lowercase();
    match (base.host_str(), url.host_str()) {
        (Some(a), Some(b)) => strip(a) == strip(b),
        _ => false,
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn page_metadata(doc: &Html) -> PageMetadata {
    let mut metadata = PageMetadata::default();

    if let Ok(title) = Selector::parse("title") {
        metadata.title = doc
            .select(&title)
            .next()
            .map(plain_text)
            .filter(|t| !t.is_empty());
    }

    let Ok(meta) = Selector::parse("meta[content]") else {
        return metadata;
    };
    for element in doc.select(&meta) {
        let attrs = element.value();
        let Some(content) = attrs.attr("content").map(str::trim) else {
            continue;
        };
        let key = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .unwrap_or_default()
            .to_ascii_lowercase();

        match key.as_str() {
            "description" => metadata.description = Some(content.to_string()),
            "keywords" => metadata.keywords = Some(content.to_string()),
            _ => {
                if let Some(og) = key.strip_prefix("og:") {
                    metadata
                        .open_graph
                        .insert(og.to_string(), content.to_string());
                }
            }
        }
    }

    metadata
}
