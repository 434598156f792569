use std::path::PathBuf;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetScriptExecutionDisabledParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, PrintToPdfParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use crawlgate_core::bundle::{BrowserBundle, RunBundle, WaitUntil};
use crawlgate_core::error::AppError;
use crawlgate_core::models::CrawlResult;
use crawlgate_core::settings::defaults;
use crawlgate_core::traits::{CrawlEngine, EngineSession};

use crate::guard::check_public_url;
use crate::page::{PageProcessor, RawPage};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet period standing in for CDP network-idle tracking.
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);
const MAX_SCROLL_STEPS: usize = 200;

const NAVIGATOR_OVERRIDE_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

const REMOVE_OVERLAYS_JS: &str = r#"
(() => {
  const selectors = [
    '[class*="cookie"]', '[id*="cookie"]', '[class*="consent"]', '[id*="consent"]',
    '[class*="popup"]', '[class*="modal"]', '[class*="overlay"]', '[role="dialog"]'
  ];
  document.querySelectorAll(selectors.join(',')).forEach(el => {
    const style = getComputedStyle(el);
    if (style.position === 'fixed' || style.position === 'sticky' || parseInt(style.zIndex) > 999) {
      el.remove();
    }
  });
  document.querySelectorAll('*').forEach(el => {
    const style = getComputedStyle(el);
    if (style.position === 'fixed' && parseInt(style.zIndex) > 999
        && el.offsetWidth >= window.innerWidth * 0.5 && el.offsetHeight >= window.innerHeight * 0.5) {
      el.remove();
    }
  });
  document.body.style.overflow = 'auto';
  return true;
})()
"#;

const PAGE_HEIGHT_JS: &str =
    "Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight)";

const IMAGES_LOADED_JS: &str = "Array.from(document.images).every(img => img.complete)";

const BODY_VISIBLE_JS: &str = "!!document.body && document.body.offsetHeight > 0";

/// Headless-Chromium engine driven through the Chrome DevTools Protocol.
///
/// Every session launches its own Chromium process configured from the
/// browser bundle, so cookies, proxies and user-data directories never leak
/// between requests. The process is torn down in [`EngineSession::close`].
#[derive(Clone, Default)]
pub struct ChromiumEngine {
    processor: PageProcessor,
    allow_private: bool,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.allow_private = true;
        self
    }
}

impl CrawlEngine for ChromiumEngine {
    type Session = ChromiumSession;

    async fn launch(&self, bundle: &BrowserBundle) -> Result<ChromiumSession, AppError> {
        let config = browser_config(bundle)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Engine(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "Browser CDP handler error");
                    break;
                }
            }
        });

        Ok(ChromiumSession {
            browser,
            handler_task,
            bundle: bundle.clone(),
            processor: self.processor.clone(),
            allow_private: self.allow_private,
        })
    }
}

/// Builds the Chromium launch configuration from a browser bundle.
fn browser_config(bundle: &BrowserBundle) -> Result<BrowserConfig, AppError> {
    let (width, height) = bundle.viewport();
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .disable_default_args()
        .window_size(width, height);

    if let Some(bin) = find_chrome_binary() {
        tracing::debug!("Using Chrome binary: {}", bin.display());
        builder = builder.chrome_executable(bin);
    }

    if let Some(dir) = &bundle.user_data_dir {
        builder = builder.user_data_dir(dir);
    }

    for arg in launch_args(bundle) {
        builder = builder.arg(arg);
    }

    builder
        .build()
        .map_err(|e| AppError::Engine(format!("Browser config error: {e}")))
}

fn launch_args(bundle: &BrowserBundle) -> Vec<String> {
    let mut args: Vec<String> = [
        "--headless=new",
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-translate",
        "--no-first-run",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    if bundle.ignores_https_errors() {
        args.push("--ignore-certificate-errors".into());
    }
    if let Some(proxy) = &bundle.proxy {
        args.push(format!("--proxy-server={}", proxy.server));
        if proxy.username.is_some() {
            tracing::warn!(server = %proxy.server, "Chromium ignores proxy credentials");
        }
    }
    if let Some(agent) = &bundle.user_agent {
        args.push(format!("--user-agent={agent}"));
    }
    if bundle.light_mode == Some(true) {
        args.extend(
            [
                "--disable-background-networking",
                "--disable-background-timer-throttling",
                "--disable-renderer-backgrounding",
                "--disable-sync",
                "--mute-audio",
            ]
            .map(String::from),
        );
    }
    if bundle.text_mode == Some(true) {
        args.extend(["--blink-settings=imagesEnabled=false", "--disable-remote-fonts"].map(String::from));
    }
    if let Some(extra) = &bundle.extra_args {
        args.extend(extra.iter().cloned());
    }

    args
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so the
/// binary inside the snap is preferred. `CHROME_BIN` overrides everything.
/// `None` leaves the lookup to chromiumoxide.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// One running Chromium process.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    bundle: BrowserBundle,
    processor: PageProcessor,
    allow_private: bool,
}

impl EngineSession for ChromiumSession {
    async fn crawl(&mut self, url: &Url, run: &RunBundle) -> Result<CrawlResult, AppError> {
        if !self.allow_private {
            check_public_url(url).await?;
        }

        let timeout = run.navigation.page_timeout();
        let page = tokio::time::timeout(timeout, self.render(url, run))
            .await
            .map_err(|_| AppError::Timeout(timeout.as_millis() as u64))??;

        self.processor.process(url, page, run)
    }

    async fn close(mut self) -> Result<(), AppError> {
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| AppError::Engine(format!("Failed to close browser: {e}")));

        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();

        closed
    }
}

impl ChromiumSession {
    /// Open a tab, drive it through the run options, and close it again.
    async fn render(&self, url: &Url, run: &RunBundle) -> Result<RawPage, AppError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(cdp("open tab"))?;

        let console_task = if run.log_console == Some(true) {
            Some(spawn_console_logger(&page).await?)
        } else {
            None
        };

        let outcome = self.drive(&page, url, run).await;

        if let Some(task) = console_task {
            task.abort();
        }
        if let Err(e) = page.close().await {
            tracing::debug!(%url, error = %e, "Failed to close tab");
        }

        outcome
    }

    async fn drive(&self, page: &Page, url: &Url, run: &RunBundle) -> Result<RawPage, AppError> {
        self.prepare(page, url, run).await?;

        page.goto(url.as_str())
            .await
            .map_err(|e| AppError::Engine(format!("Failed to navigate to {url}: {e}")))?;

        match run.navigation.wait_until.unwrap_or_default() {
            WaitUntil::NetworkIdle => tokio::time::sleep(NETWORK_IDLE_GRACE).await,
            WaitUntil::DomContentLoaded | WaitUntil::Load => {}
        }

        if run.interaction.ignore_body_visibility == Some(false) {
            poll_js(page, BODY_VISIBLE_JS).await?;
        }
        if let Some(condition) = &run.navigation.wait_for {
            wait_for(page, condition).await?;
        }
        if run.navigation.wait_for_images == Some(true) {
            poll_js(page, IMAGES_LOADED_JS).await?;
        }

        for (index, snippet) in run.interaction.js_code.iter().enumerate() {
            page.evaluate(snippet.as_str())
                .await
                .map_err(|e| AppError::Engine(format!("js_code[{index}] failed: {e}")))?;
        }

        if run.interaction.scan_full_page == Some(true) {
            self.scroll_full_page(page, run).await?;
        }
        if run.interaction.remove_overlay_elements == Some(true) || run.interaction.magic == Some(true) {
            page.evaluate(REMOVE_OVERLAYS_JS)
                .await
                .map_err(cdp("remove overlays"))?;
        }

        tokio::time::sleep(run.navigation.delay_before_return_html()).await;

        let html = page.content().await.map_err(cdp("read page content"))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok());

        let screenshot = match run.media.screenshot {
            Some(true) => Some(screenshot(page, run).await?),
            _ => None,
        };
        let pdf = match run.media.pdf {
            Some(true) => Some(
                page.pdf(PrintToPdfParams::default())
                    .await
                    .map(|bytes| general_purpose::STANDARD.encode(bytes))
                    .map_err(cdp("print PDF"))?,
            ),
            _ => None,
        };

        Ok(RawPage {
            url: final_url,
            html,
            screenshot,
            pdf,
            ..Default::default()
        })
    }

    /// Per-tab setup that must happen before navigation.
    async fn prepare(&self, page: &Page, url: &Url, run: &RunBundle) -> Result<(), AppError> {
        let bundle = &self.bundle;
        let (width, height) = bundle.viewport();
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(width),
            i64::from(height),
            1.0,
            false,
        ))
        .await
        .map_err(cdp("set viewport"))?;

        // User agent is applied at launch through `--user-agent`.
        if let Some(headers) = &bundle.headers {
            let headers = Headers::new(serde_json::to_value(headers)?);
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(cdp("set headers"))?;
        }
        if !bundle.javascript_enabled() {
            page.execute(SetScriptExecutionDisabledParams::new(true))
                .await
                .map_err(cdp("disable JavaScript"))?;
        }
        if run.interaction.override_navigator == Some(true)
            || run.interaction.simulate_user == Some(true)
            || run.interaction.magic == Some(true)
        {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(NAVIGATOR_OVERRIDE_JS))
                .await
                .map_err(cdp("override navigator"))?;
        }
        if let Some(cookies) = &bundle.cookies {
            let params: Vec<CookieParam> = cookies
                .iter()
                .map(|c| {
                    let mut param = CookieParam::new(c.name.clone(), c.value.clone());
                    param.domain = c.domain.clone();
                    param.path = c.path.clone();
                    param.url = c
                        .url
                        .clone()
                        .or_else(|| c.domain.is_none().then(|| url.to_string()));
                    param
                })
                .collect();
            page.set_cookies(params).await.map_err(cdp("set cookies"))?;
        }

        Ok(())
    }

    /// Scroll to the bottom one viewport at a time so lazy content loads.
    async fn scroll_full_page(&self, page: &Page, run: &RunBundle) -> Result<(), AppError> {
        let (_, step) = self.bundle.viewport();
        let delay = run.interaction.scroll_delay();
        let mut position = 0u64;

        for _ in 0..MAX_SCROLL_STEPS {
            let height = page_height(page).await?;
            if position >= height {
                break;
            }
            position += u64::from(step);
            page.evaluate(format!("window.scrollTo(0, {position})"))
                .await
                .map_err(cdp("scroll"))?;
            tokio::time::sleep(delay).await;
        }

        page.evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(cdp("scroll"))?;
        Ok(())
    }
}

async fn screenshot(page: &Page, run: &RunBundle) -> Result<String, AppError> {
    if let Some(wait) = run.media.screenshot_wait_for() {
        tokio::time::sleep(wait).await;
    }

    let threshold = run
        .media
        .screenshot_height_threshold
        .unwrap_or(defaults::SCREENSHOT_HEIGHT_THRESHOLD);
    let full_page = page_height(page).await? <= u64::from(threshold);

    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(full_page)
        .build();

    page.screenshot(params)
        .await
        .map(|png| general_purpose::STANDARD.encode(png))
        .map_err(cdp("take screenshot"))
}

async fn page_height(page: &Page) -> Result<u64, AppError> {
    let height: f64 = page
        .evaluate(PAGE_HEIGHT_JS)
        .await
        .map_err(cdp("measure page"))?
        .into_value()
        .unwrap_or(0.0);
    Ok(height.max(0.0) as u64)
}

/// `css:<selector>` waits for an element, `js:<expr>` for a truthy
/// expression. Without a prefix the condition is taken as a selector.
async fn wait_for(page: &Page, condition: &str) -> Result<(), AppError> {
    let condition = condition.trim();
    if let Some(expr) = condition.strip_prefix("js:") {
        return poll_js(page, &format!("!!({})", expr.trim())).await;
    }

    let selector = condition.strip_prefix("css:").unwrap_or(condition).trim();
    while page.find_element(selector).await.is_err() {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

/// Poll a boolean expression until it holds; bounded by the crawl timeout.
async fn poll_js(page: &Page, expr: &str) -> Result<(), AppError> {
    loop {
        let ready: bool = page
            .evaluate(expr)
            .await
            .map_err(cdp("evaluate wait condition"))?
            .into_value()
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn spawn_console_logger(page: &Page) -> Result<JoinHandle<()>, AppError> {
    let mut events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(cdp("listen to console"))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let text = event
                .args
                .iter()
                .filter_map(|arg| {
                    arg.value
                        .as_ref()
                        .map(|v| v.to_string())
                        .or_else(|| arg.description.clone())
                })
                .collect::<Vec<_>>()
                .join(" ");
            tracing::info!(kind = ?event.r#type, "browser console: {text}");
        }
    }))
}

fn cdp(action: &'static str) -> impl Fn(CdpError) -> AppError {
    move |e| AppError::Engine(format!("Failed to {action}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlgate_core::settings::ProxyConfig;

    #[test]
    fn test_launch_args_default() {
        let args = launch_args(&BrowserBundle::default());
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--proxy-server")));
    }

    #[test]
    fn test_launch_args_from_bundle() {
        let bundle = BrowserBundle {
            ignore_https_errors: Some(false),
            proxy: Some(ProxyConfig {
                server: "http://proxy.local:3128".into(),
                ..Default::default()
            }),
            user_agent: Some("agent/1.0".into()),
            text_mode: Some(true),
            extra_args: Some(vec!["--lang=de".into()]),
            ..Default::default()
        };
        let args = launch_args(&bundle);

        assert!(!args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&"--proxy-server=http://proxy.local:3128".to_string()));
        assert!(args.contains(&"--user-agent=agent/1.0".to_string()));
        assert!(args.contains(&"--blink-settings=imagesEnabled=false".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=de"));
    }
}
