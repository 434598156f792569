use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of one crawl, serialized verbatim into the `result` field of the
/// HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlResult {
    /// Final URL after redirects.
    pub url: String,
    pub success: bool,
    /// Raw page HTML as delivered by the engine.
    pub html: String,
    pub cleaned_html: Option<String>,
    pub markdown: Option<String>,
    /// JSON-encoded records produced by the extraction strategy.
    pub extracted_content: Option<String>,
    pub links: Links,
    pub media: Media,
    pub metadata: PageMetadata,
    /// Base64-encoded PNG.
    pub screenshot: Option<String>,
    /// Base64-encoded PDF.
    pub pdf: Option<String>,
    pub status_code: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    pub error_message: Option<String>,
    pub session_id: Option<String>,
}

/// A hyperlink found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Links {
    pub internal: Vec<Link>,
    pub external: Vec<Link>,
}

/// An image found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Media {
    pub images: Vec<Image>,
}

/// Document-level metadata from `<title>` and `<meta>` tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    /// `og:*` properties keyed without the prefix.
    pub open_graph: BTreeMap<String, String>,
}

impl CrawlResult {
    /// The extracted records, parsed back from `extracted_content`.
    pub fn extracted_records(&self) -> Option<serde_json::Value> {
        self.extracted_content
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_serializes_every_key() {
        let result = CrawlResult {
            url: "https://example.com/".into(),
            success: true,
            html: "<html></html>".into(),
            status_code: Some(200),
            ..Default::default()
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["url"], "https://example.com/");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["screenshot"], serde_json::Value::Null);
        assert_eq!(value["links"], json!({"internal": [], "external": []}));
    }

    #[test]
    fn test_extracted_records_parse() {
        let result = CrawlResult {
            extracted_content: Some(r#"[{"title":"Hello"}]"#.into()),
            ..Default::default()
        };
        assert_eq!(result.extracted_records(), Some(json!([{"title": "Hello"}])));
        assert_eq!(CrawlResult::default().extracted_records(), None);
    }
}
