use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "crawlgate",
        version = "0.1.0",
        description = "Authenticated web crawling with JSON-CSS structured extraction."
    ),
    paths(
        crate::routes::crawl,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CrawlRequest,
        crate::dto::CrawlResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
        crawlgate_core::settings::BrowserSettings,
        crawlgate_core::settings::CrawlerConfig,
        crawlgate_core::settings::ProxyConfig,
        crawlgate_core::settings::Cookie,
        crawlgate_core::settings::JsCode,
        crawlgate_core::schema::ExtractionSchema,
        crawlgate_core::schema::ExtractionField,
        crawlgate_core::schema::FieldKind,
    )),
    tags(
        (name = "crawl", description = "Crawl a URL and extract its content"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the `x-token` API-key security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "x-token",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::with_description(
                            crate::auth::TOKEN_HEADER,
                            "Shared secret. Set via the API_TOKEN environment variable.",
                        ),
                    ),
                ),
            );
        }
    }
}
