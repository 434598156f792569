//! Translated configuration handed to a [`CrawlEngine`](crate::traits::CrawlEngine).
//!
//! Two bundles per request: [`BrowserBundle`] configures the browser instance,
//! [`RunBundle`] configures one crawl. Options the caller left unset are
//! `None` here and are skipped when a bundle is serialized.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::schema::ExtractionSchema;
use crate::settings::{Cookie, ProxyConfig, defaults};

/// Browser family. Only Chromium is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    #[default]
    Chromium,
}

/// When navigation is considered complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WaitUntil {
    #[default]
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        }
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!(
                "unknown wait condition '{other}' (expected domcontentloaded, load or networkidle)"
            )),
        }
    }
}

/// Cache policy for a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Enabled,
    Disabled,
    Bypass,
    WriteOnly,
    ReadOnly,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Enabled => "enabled",
            CacheMode::Disabled => "disabled",
            CacheMode::Bypass => "bypass",
            CacheMode::WriteOnly => "write_only",
            CacheMode::ReadOnly => "read_only",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(CacheMode::Enabled),
            "disabled" => Ok(CacheMode::Disabled),
            "bypass" => Ok(CacheMode::Bypass),
            "write_only" => Ok(CacheMode::WriteOnly),
            "read_only" => Ok(CacheMode::ReadOnly),
            other => Err(format!(
                "unknown cache mode '{other}' (expected enabled, disabled, bypass, write_only or read_only)"
            )),
        }
    }
}

/// How structured data is pulled out of the rendered page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// CSS-selector driven extraction described by a JSON schema.
    JsonCss { schema: ExtractionSchema },
}

impl ExtractionStrategy {
    pub fn schema(&self) -> &ExtractionSchema {
        match self {
            ExtractionStrategy::JsonCss { schema } => schema,
        }
    }
}

/// Browser-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserBundle {
    /// Always true.
    pub headless: bool,
    /// Always Chromium.
    pub browser_type: BrowserType,
    pub verbose: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<u32>,
    /// `proxy_config` if given, otherwise `proxy` lifted into a config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_https_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_script_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_persistent_context: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_managed_browser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,
}

impl Default for BrowserBundle {
    fn default() -> Self {
        Self {
            headless: true,
            browser_type: BrowserType::Chromium,
            verbose: true,
            viewport_width: None,
            viewport_height: None,
            proxy: None,
            ignore_https_errors: None,
            java_script_enabled: None,
            use_persistent_context: None,
            user_data_dir: None,
            cookies: None,
            headers: None,
            user_agent: None,
            light_mode: None,
            text_mode: None,
            use_managed_browser: None,
            extra_args: None,
        }
    }
}

impl BrowserBundle {
    /// `(width, height)` with defaults applied.
    pub fn viewport(&self) -> (u32, u32) {
        (
            self.viewport_width.unwrap_or(defaults::VIEWPORT_WIDTH),
            self.viewport_height.unwrap_or(defaults::VIEWPORT_HEIGHT),
        )
    }

    pub fn ignores_https_errors(&self) -> bool {
        self.ignore_https_errors
            .unwrap_or(defaults::IGNORE_HTTPS_ERRORS)
    }

    pub fn javascript_enabled(&self) -> bool {
        self.java_script_enabled
            .unwrap_or(defaults::JAVA_SCRIPT_ENABLED)
    }

    /// Serialize to JSON, omitting unset options.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Content filtering options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prettiify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_data_attributes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_forms: Option<bool>,
}

/// Navigation and timing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavigationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<WaitUntil>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_images: Option<bool>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_before_return_html: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semaphore_count: Option<u32>,
}

impl NavigationOptions {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout.unwrap_or(defaults::PAGE_TIMEOUT_MS))
    }

    pub fn delay_before_return_html(&self) -> Duration {
        seconds(
            self.delay_before_return_html
                .unwrap_or(defaults::DELAY_BEFORE_RETURN_HTML_SECS),
        )
    }
}

/// Page interaction options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionOptions {
    /// Snippets run in order after load.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub js_code: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_body_visibility: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_full_page: Option<bool>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_iframes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_overlay_elements: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulate_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_navigator: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjust_viewport_to_content: Option<bool>,
}

impl InteractionOptions {
    pub fn scroll_delay(&self) -> Duration {
        seconds(self.scroll_delay.unwrap_or(defaults::SCROLL_DELAY_SECS))
    }
}

/// Screenshot, PDF and image options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<bool>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_wait_for: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_height_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_description_min_word_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_external_images: Option<bool>,
}

impl MediaOptions {
    /// Extra wait before the screenshot, if any.
    pub fn screenshot_wait_for(&self) -> Option<Duration> {
        self.screenshot_wait_for
            .filter(|s| *s > 0.0)
            .map(seconds)
    }
}

/// Link and domain filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_social_media_domains: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_external_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_social_media_links: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
}

/// Run-level configuration for one crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunBundle {
    #[serde(flatten)]
    pub content: ContentOptions,
    #[serde(flatten)]
    pub navigation: NavigationOptions,
    #[serde(flatten)]
    pub interaction: InteractionOptions,
    #[serde(flatten)]
    pub media: MediaOptions,
    #[serde(flatten)]
    pub links: LinkOptions,

    /// Effective mode after shorthand resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_mode: Option<CacheMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_strategy: Option<ExtractionStrategy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_console: Option<bool>,
}

impl RunBundle {
    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode.unwrap_or_default()
    }

    /// Serialize to JSON, omitting unset options.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Seconds to a [`Duration`]. Negative or NaN becomes zero, overflow saturates.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_bundles_serialize_only_fixed_policy() {
        assert_eq!(
            BrowserBundle::default().to_value(),
            json!({"headless": true, "browser_type": "chromium", "verbose": true})
        );
        assert_eq!(RunBundle::default().to_value(), json!({}));
    }

    #[test]
    fn test_defaults_apply_through_accessors() {
        let browser = BrowserBundle::default();
        assert_eq!(browser.viewport(), (1080, 600));
        assert!(browser.ignores_https_errors());
        assert!(browser.javascript_enabled());

        let run = RunBundle::default();
        assert_eq!(run.navigation.page_timeout(), Duration::from_secs(60));
        assert_eq!(
            run.navigation.delay_before_return_html(),
            Duration::from_millis(100)
        );
        assert_eq!(run.interaction.scroll_delay(), Duration::from_millis(200));
        assert_eq!(run.cache_mode(), CacheMode::Enabled);
    }

    #[test]
    fn test_out_of_range_seconds_do_not_panic() {
        let run = RunBundle {
            navigation: NavigationOptions {
                delay_before_return_html: Some(1e20),
                ..Default::default()
            },
            interaction: InteractionOptions {
                scroll_delay: Some(f64::NAN),
                ..Default::default()
            },
            media: MediaOptions {
                screenshot_wait_for: Some(f64::INFINITY),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(run.navigation.delay_before_return_html(), Duration::MAX);
        assert_eq!(run.interaction.scroll_delay(), Duration::ZERO);
        assert_eq!(run.media.screenshot_wait_for(), Some(Duration::MAX));
        assert_eq!(MediaOptions::default().screenshot_wait_for(), None);
    }

    #[test]
    fn test_enum_wire_literals() {
        assert_eq!(
            serde_json::to_value(WaitUntil::DomContentLoaded).unwrap(),
            json!("domcontentloaded")
        );
        assert_eq!(
            serde_json::to_value(CacheMode::WriteOnly).unwrap(),
            json!("write_only")
        );
        for mode in ["enabled", "disabled", "bypass", "write_only", "read_only"] {
            assert_eq!(mode.parse::<CacheMode>().unwrap().as_str(), mode);
        }
        for wait in ["domcontentloaded", "load", "networkidle"] {
            assert_eq!(wait.parse::<WaitUntil>().unwrap().as_str(), wait);
        }
    }

    #[test]
    fn test_flattened_run_bundle() {
        let run = RunBundle {
            navigation: NavigationOptions {
                page_timeout: Some(30_000),
                ..Default::default()
            },
            media: MediaOptions {
                screenshot: Some(true),
                ..Default::default()
            },
            cache_mode: Some(CacheMode::Bypass),
            ..Default::default()
        };
        assert_eq!(
            run.to_value(),
            json!({"page_timeout": 30000, "screenshot": true, "cache_mode": "bypass"})
        );
    }
}
