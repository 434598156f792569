use std::collections::BTreeMap;

use url::Url;

use crawlgate_core::bundle::RunBundle;
use crawlgate_core::error::AppError;
use crawlgate_core::models::CrawlResult;

use crate::cleaner::ContentCleaner;
use crate::extractor::JsonCssExtractor;

/// A page as delivered by an engine, before any processing.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    /// Final URL after redirects.
    pub url: Option<Url>,
    pub html: String,
    pub status_code: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    pub screenshot: Option<String>,
    pub pdf: Option<String>,
    /// Set when the engine got a page back but considers the crawl failed.
    pub error_message: Option<String>,
}

/// Turns a [`RawPage`] into a [`CrawlResult`]: cleaning, Markdown, links,
/// media, metadata and, if the run carries a strategy, structured extraction.
#[derive(Clone, Default)]
pub struct PageProcessor {
    cleaner: ContentCleaner,
}

impl PageProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&self, requested: &Url, page: RawPage, run: &RunBundle) -> Result<CrawlResult, AppError> {
        let url = page.url.unwrap_or_else(|| requested.clone());
        let content = self.cleaner.clean(&page.html, &url, run)?;

        let extracted_content = match &run.extraction_strategy {
            Some(strategy) => {
                let extractor = JsonCssExtractor::new(strategy.schema())?;
                let records = extractor.extract(&page.html);
                tracing::debug!(%url, records = records.len(), "Structured extraction done");
                Some(serde_json::to_string(&records)?)
            }
            None => None,
        };

        Ok(CrawlResult {
            url: url.to_string(),
            success: page.error_message.is_none(),
            html: page.html,
            cleaned_html: Some(content.cleaned_html),
            markdown: Some(content.markdown),
            extracted_content,
            links: content.links,
            media: content.media,
            metadata: content.metadata,
            screenshot: page.screenshot,
            pdf: page.pdf,
            status_code: page.status_code,
            response_headers: page.response_headers,
            error_message: page.error_message,
            session_id: run.session_id.clone(),
        })
    }
}
