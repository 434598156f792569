//! Engine implementations and page processing for crawlgate.

pub mod cleaner;
pub mod extractor;
pub mod fetcher;
pub mod guard;
pub mod page;

#[cfg(feature = "browser")]
pub mod browser_engine;

#[cfg(feature = "browser")]
pub use browser_engine::ChromiumEngine;
pub use cleaner::{CleanedContent, ContentCleaner};
pub use extractor::JsonCssExtractor;
pub use fetcher::HttpEngine;
pub use page::{PageProcessor, RawPage};
