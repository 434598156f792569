//! Core of crawlgate: request settings, the extraction schema, translation
//! into engine bundles, the engine traits and the crawl service.

pub mod bundle;
pub mod crawl;
pub mod error;
pub mod models;
pub mod schema;
pub mod settings;
pub mod traits;
pub mod translate;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use bundle::{BrowserBundle, CacheMode, ExtractionStrategy, RunBundle, WaitUntil};
pub use crawl::CrawlService;
pub use error::{AppError, SchemaError};
pub use models::CrawlResult;
pub use schema::{ExtractionField, ExtractionSchema, FieldKind};
pub use settings::{BrowserSettings, CrawlerConfig};
pub use traits::{CrawlEngine, EngineSession};
pub use translate::{Translation, translate};
