//! Test utilities: a mock crawl engine.
//!
//! Handwritten mock for dependency injection in unit and router tests.
//! State lives behind `Arc<Mutex<_>>` so clones share recorded calls and
//! tests can assert on them after the engine was moved into a service.

use std::sync::{Arc, Mutex};

use url::Url;

use crate::bundle::{BrowserBundle, RunBundle};
use crate::error::AppError;
use crate::models::CrawlResult;
use crate::traits::{CrawlEngine, EngineSession};

#[derive(Default)]
struct MockState {
    html: String,
    launch_error: Option<String>,
    crawl_error: Option<String>,
    fail_close: bool,
    launches: Vec<BrowserBundle>,
    crawls: Vec<RunBundle>,
    urls: Vec<String>,
    closes: usize,
}

/// Mock engine returning a fixed HTML page.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new(html: &str) -> Self {
        Self::from_state(MockState {
            html: html.to_string(),
            ..Default::default()
        })
    }

    /// Launch succeeds, every crawl fails with `message`.
    pub fn with_crawl_error(message: &str) -> Self {
        Self::from_state(MockState {
            crawl_error: Some(message.to_string()),
            ..Default::default()
        })
    }

    /// Launch itself fails with `message`.
    pub fn with_launch_error(message: &str) -> Self {
        Self::from_state(MockState {
            launch_error: Some(message.to_string()),
            ..Default::default()
        })
    }

    /// Make `close` return an error.
    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    fn from_state(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().launches.len()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn launched_with(&self) -> Vec<BrowserBundle> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn crawled_with(&self) -> Vec<RunBundle> {
        self.state.lock().unwrap().crawls.clone()
    }

    pub fn crawled_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }
}

impl CrawlEngine for MockEngine {
    type Session = MockSession;

    async fn launch(&self, browser: &BrowserBundle) -> Result<MockSession, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.launch_error {
            return Err(AppError::Engine(message.clone()));
        }
        state.launches.push(browser.clone());
        Ok(MockSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session handed out by [`MockEngine`].
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl EngineSession for MockSession {
    async fn crawl(&mut self, url: &Url, run: &RunBundle) -> Result<CrawlResult, AppError> {
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.to_string());
        state.crawls.push(run.clone());

        if let Some(message) = &state.crawl_error {
            return Err(AppError::Engine(message.clone()));
        }

        Ok(CrawlResult {
            url: url.to_string(),
            success: true,
            html: state.html.clone(),
            status_code: Some(200),
            session_id: run.session_id.clone(),
            ..Default::default()
        })
    }

    async fn close(self) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        if state.fail_close {
            return Err(AppError::Engine("browser already gone".into()));
        }
        Ok(())
    }
}
