use serde::{Deserialize, Serialize};

use crawlgate_core::{BrowserSettings, CrawlerConfig};

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[schema(example = json!({
    "url": "https://example.com",
    "browser": {"viewport_width": 1280, "user_agent": "Mozilla/5.0"},
    "config": {
        "page_timeout": 30000,
        "cache_mode": "bypass",
        "extraction_schema": {
            "name": "articles",
            "baseSelector": "article",
            "fields": [{"name": "title", "selector": "h2", "type": "text"}]
        }
    }
}))]
pub struct CrawlRequest {
    /// Absolute http(s) URL to crawl.
    pub url: String,
    /// Browser-level settings; every option is optional.
    #[serde(default)]
    pub browser: Option<BrowserSettings>,
    /// Run-level crawler configuration; every option is optional.
    #[serde(default)]
    pub config: Option<CrawlerConfig>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CrawlResponse {
    /// The URL as requested.
    pub url: String,
    /// The full crawl result.
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Request field or schema node the error refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
