use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy, Response};
use url::Url;

use crawlgate_core::bundle::{BrowserBundle, RunBundle};
use crawlgate_core::error::AppError;
use crawlgate_core::models::CrawlResult;
use crawlgate_core::settings::{Cookie, ProxyConfig};
use crawlgate_core::traits::{CrawlEngine, EngineSession};

use crate::guard::check_public_url;
use crate::page::{PageProcessor, RawPage};

const DEFAULT_USER_AGENT: &str = "crawlgate/0.1";
const MAX_REDIRECTS: usize = 10;

/// Largest response body read by default.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Static-fetch engine using reqwest.
///
/// Each session owns a reqwest client built from the browser bundle (user
/// agent, headers, cookies, proxy, TLS policy). No JavaScript runs, so the
/// options that need a live page are ignored.
///
/// SSRF protection is **enabled** by default and covers every redirect hop;
/// see [`allow_private_urls`](Self::allow_private_urls).
#[derive(Clone)]
pub struct HttpEngine {
    processor: PageProcessor,
    allow_private: bool,
    max_body_bytes: usize,
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self {
            processor: PageProcessor::default(),
            allow_private: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HttpEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.allow_private = true;
        self
    }

    /// Fail crawls whose response body is larger than `limit` bytes.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl CrawlEngine for HttpEngine {
    type Session = HttpSession;

    async fn launch(&self, browser: &BrowserBundle) -> Result<HttpSession, AppError> {
        // Redirects are followed by hand so each hop goes through the guard.
        let mut builder = Client::builder()
            .user_agent(browser.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .danger_accept_invalid_certs(browser.ignores_https_errors())
            .default_headers(header_map(browser.headers.as_ref())?)
            .redirect(Policy::none());

        if let Some(proxy) = &browser.proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Engine(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpSession {
            client,
            processor: self.processor.clone(),
            allow_private: self.allow_private,
            max_body_bytes: self.max_body_bytes,
            cookies: browser.cookies.clone().unwrap_or_default(),
        })
    }
}

/// One configured HTTP client.
pub struct HttpSession {
    client: Client,
    processor: PageProcessor,
    allow_private: bool,
    max_body_bytes: usize,
    cookies: Vec<Cookie>,
}

impl HttpSession {
    /// GET `url`, following up to [`MAX_REDIRECTS`] redirects.
    ///
    /// `url` itself is not checked here; every hop after it is.
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Response, AppError> {
        let mut current = url.clone();

        for _ in 0..=MAX_REDIRECTS {
            let mut request = self.client.get(current.clone()).timeout(timeout);
            if let Some(cookies) = cookie_header(&self.cookies, &current) {
                request = request.header(COOKIE, cookies);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(timeout.as_millis() as u64)
                } else if e.is_connect() {
                    AppError::Engine(format!("Connection failed: {e}"))
                } else {
                    AppError::Engine(e.to_string())
                }
            })?;

            let Some(next) = redirect_target(&current, &response)? else {
                return Ok(response);
            };
            if !self.allow_private {
                check_public_url(&next).await?;
            }
            tracing::debug!(from = %current, to = %next, "Following redirect");
            current = next;
        }

        Err(AppError::Engine(format!(
            "Too many redirects (more than {MAX_REDIRECTS})"
        )))
    }

    async fn read_body(&self, mut response: Response, timeout: Duration) -> Result<String, AppError> {
        let limit = self.max_body_bytes;
        let too_large = || AppError::Engine(format!("Response body exceeds {limit} bytes"));

        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_millis() as u64)
            } else {
                AppError::Engine(format!("Failed to read response body: {e}"))
            }
        })? {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl EngineSession for HttpSession {
    async fn crawl(&mut self, url: &Url, run: &RunBundle) -> Result<CrawlResult, AppError> {
        if !self.allow_private {
            check_public_url(url).await?;
        }
        log_ignored_options(url, run);

        let timeout = run.navigation.page_timeout();
        let response = self.fetch(url, timeout).await?;

        let status = response.status();
        let final_url = response.url().clone();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let html = self.read_body(response, timeout).await?;

        let error_message = (!status.is_success()).then(|| format!("HTTP {} for {}", status.as_u16(), final_url));

        let page = RawPage {
            url: Some(final_url),
            html,
            status_code: Some(status.as_u16()),
            response_headers,
            error_message,
            ..Default::default()
        };

        self.processor.process(url, page, run)
    }

    async fn close(self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Where a 3xx response points, resolved against the URL that produced it.
fn redirect_target(current: &Url, response: &Response) -> Result<Option<Url>, AppError> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    // 304 and friends carry no Location.
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };

    let location = location
        .to_str()
        .map_err(|_| AppError::Engine(format!("Unreadable redirect location from {current}")))?;
    let next = current
        .join(location)
        .map_err(|e| AppError::Engine(format!("Invalid redirect location '{location}': {e}")))?;

    match next.scheme() {
        "http" | "https" => Ok(Some(next)),
        scheme => Err(AppError::Engine(format!(
            "Refusing redirect to a {scheme} URL"
        ))),
    }
}

fn header_map(headers: Option<&BTreeMap<String, String>>) -> Result<HeaderMap, AppError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.into_iter().flatten() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::validation("browser.headers", format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::validation("browser.headers", format!("invalid value for '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn build_proxy(config: &ProxyConfig) -> Result<Proxy, AppError> {
    let proxy = Proxy::all(config.server.as_str())
        .map_err(|e| AppError::validation("browser.proxy", format!("invalid proxy '{}': {e}", config.server)))?;

    Ok(match &config.username {
        Some(username) => proxy.basic_auth(username, config.password.as_deref().unwrap_or_default()),
        None => proxy,
    })
}

/// `Cookie` header for `target`, holding only the cookies scoped to it.
fn cookie_header(cookies: &[Cookie], target: &Url) -> Option<String> {
    let header = cookies
        .iter()
        .filter(|c| cookie_applies(c, target))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    (!header.is_empty()).then_some(header)
}

/// `domain` matches the host and its subdomains, `url` only its own host.
/// A cookie with neither belongs to the crawl target.
fn cookie_applies(cookie: &Cookie, target: &Url) -> bool {
    let Some(host) = target.host_str() else {
        return false;
    };

    let host_matches = match (&cookie.domain, &cookie.url) {
        (Some(domain), _) => {
            let domain = domain.trim_start_matches('.').to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        }
        (None, Some(url)) => Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == host))
            .unwrap_or(false),
        (None, None) => true,
    };

    host_matches && cookie.path.as_deref().is_none_or(|p| target.path().starts_with(p))
}

fn log_ignored_options(url: &Url, run: &RunBundle) {
    let ignored: Vec<&str> = [
        (!run.interaction.js_code.is_empty(), "js_code"),
        (run.navigation.wait_for.is_some(), "wait_for"),
        (run.media.screenshot == Some(true), "screenshot"),
        (run.media.pdf == Some(true), "pdf"),
        (run.interaction.scan_full_page == Some(true), "scan_full_page"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    if !ignored.is_empty() {
        tracing::debug!(%url, ?ignored, "HTTP engine cannot honour browser-only options");
    }
}
