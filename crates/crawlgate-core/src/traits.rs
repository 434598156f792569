use std::future::Future;

use url::Url;

use crate::bundle::{BrowserBundle, RunBundle};
use crate::error::AppError;
use crate::models::CrawlResult;

/// Launches engine sessions configured from a [`BrowserBundle`].
///
/// One session is launched per request and is never shared between
/// requests.
pub trait CrawlEngine: Send + Sync + Clone {
    type Session: EngineSession;

    fn launch(
        &self,
        browser: &BrowserBundle,
    ) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// A live engine instance (for Chromium, one browser process).
pub trait EngineSession: Send {
    /// Crawl a single URL.
    fn crawl(
        &mut self,
        url: &Url,
        run: &RunBundle,
    ) -> impl Future<Output = Result<CrawlResult, AppError>> + Send;

    /// Release the instance. Called exactly once, on success and on failure.
    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}
