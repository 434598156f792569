use crate::error::AppError;
use crate::models::CrawlResult;
use crate::traits::{CrawlEngine, EngineSession};
use crate::translate::Translation;

/// Runs one translated request against an engine: launch → crawl → close.
///
/// Generic over the engine so handlers can be exercised with a mock.
pub struct CrawlService<E: CrawlEngine> {
    engine: E,
}

impl<E: CrawlEngine> CrawlService<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Crawl `translation.url` in a fresh engine session.
    ///
    /// The session is closed on every exit path once launched. A failed close
    /// is logged and does not replace the crawl's own outcome.
    pub async fn crawl(&self, translation: &Translation) -> Result<CrawlResult, AppError> {
        let url = &translation.url;

        tracing::info!(%url, "Launching engine session");
        let mut session = self.engine.launch(&translation.browser).await?;

        let outcome = session.crawl(url, &translation.run).await;

        if let Err(e) = session.close().await {
            tracing::warn!(%url, error = %e, "Failed to close engine session");
        }

        match &outcome {
            Ok(result) => tracing::info!(
                %url,
                success = result.success,
                status = ?result.status_code,
                html_bytes = result.html.len(),
                "Crawl complete"
            ),
            Err(e) => tracing::warn!(%url, error = %e, "Crawl failed"),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BrowserSettings, CrawlerConfig};
    use crate::testutil::MockEngine;
    use crate::translate::translate;

    fn translation() -> Translation {
        translate(
            "https://example.com",
            BrowserSettings::default(),
            CrawlerConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let engine = MockEngine::new("<html><body>ok</body></html>");
        let service = CrawlService::new(engine.clone());

        let result = service.crawl(&translation()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.url, "https://example.com/");
        assert_eq!(engine.launch_count(), 1);
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_crawl_failure() {
        let engine = MockEngine::with_crawl_error("net::ERR_CONNECTION_REFUSED");
        let service = CrawlService::new(engine.clone());

        let err = service.crawl(&translation()).await.unwrap_err();

        assert!(matches!(err, AppError::Engine(ref msg) if msg.contains("CONNECTION_REFUSED")));
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_mask_result() {
        let engine = MockEngine::new("<html></html>").failing_close();
        let service = CrawlService::new(engine.clone());

        assert!(service.crawl(&translation()).await.is_ok());
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_skips_crawl() {
        let engine = MockEngine::with_launch_error("chromium not found");
        let service = CrawlService::new(engine.clone());

        let err = service.crawl(&translation()).await.unwrap_err();

        assert!(err.is_engine_failure());
        assert!(engine.crawled_urls().is_empty());
        assert_eq!(engine.close_count(), 0);
    }

    #[tokio::test]
    async fn test_bundles_reach_engine() {
        let engine = MockEngine::new("<html></html>");
        let service = CrawlService::new(engine.clone());
        let mut translation = translation();
        translation.browser.viewport_width = Some(1920);
        translation.run.session_id = Some("session_123".into());

        service.crawl(&translation).await.unwrap();

        assert_eq!(engine.launched_with()[0].viewport_width, Some(1920));
        assert_eq!(
            engine.crawled_with()[0].session_id.as_deref(),
            Some("session_123")
        );
    }
}
