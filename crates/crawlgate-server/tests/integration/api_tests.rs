use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use crawlgate_core::testutil::MockEngine;

use crate::integration::common::{crawl_request, setup_test_app, with_engine};

async fn json_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/crawl"].is_object());
}

#[tokio::test]
async fn missing_token_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::post("/crawl")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn wrong_token_returns_401_before_body_parsing() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::post("/crawl")
                .header("x-token", "wrong-key")
                .header("content-type", "application/json")
                .body(Body::from("not json at all"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn crawl_returns_url_and_result() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({"url": "https://example.com/items"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["url"], "https://example.com/items");
    assert_eq!(json["result"]["success"], true);
    assert_eq!(json["result"]["status_code"], 200);
    assert!(json["result"]["html"].as_str().unwrap().contains("First"));

    assert_eq!(app.engine.crawled_urls(), ["https://example.com/items"]);
    assert_eq!(app.engine.close_count(), 1);
}

#[tokio::test]
async fn settings_are_translated_for_the_engine() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "browser": {"viewport_width": 1920, "user_agent": "agent/1.0"},
            "config": {
                "cache_mode": "enabled",
                "bypass_cache": true,
                "page_timeout": 5000,
                "extraction_schema": {
                    "name": "t",
                    "baseSelector": ".item",
                    "fields": [{"name": "title", "selector": "h2", "type": "text"}]
                }
            }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let browser = &app.engine.launched_with()[0];
    assert!(browser.headless);
    assert_eq!(browser.viewport_width, Some(1920));
    assert_eq!(browser.user_agent.as_deref(), Some("agent/1.0"));

    let run = app.engine.crawled_with()[0].to_value();
    assert_eq!(run["cache_mode"], "bypass");
    assert_eq!(run["page_timeout"], 5000);
    assert_eq!(run["extraction_strategy"]["schema"]["baseSelector"], ".item");
}

#[tokio::test]
async fn negative_viewport_returns_422_without_launch() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "browser": {"viewport_width": -10}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
    assert!(json["field"].as_str().unwrap().contains("viewport_width"));
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn nested_field_without_children_returns_schema_error() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "config": {
                "extraction_schema": {
                    "name": "t",
                    "baseSelector": ".item",
                    "fields": [{"name": "details", "selector": "div", "type": "nested", "fields": []}]
                }
            }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "schema_error");
    assert_eq!(json["field"], "fields[0]");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn invalid_url_returns_422() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({"url": "ftp://example.com/file"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["field"], "url");
}

#[tokio::test]
async fn malformed_body_returns_422() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::post("/crawl")
                .header("x-token", crate::integration::common::TEST_API_KEY)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"browser": {}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "body");
}

#[tokio::test]
async fn wrong_option_type_names_the_field() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "browser": {"viewport_width": "wide"}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "browser.viewport_width");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn invalid_schema_selector_fails_before_launch() {
    let app = with_engine(MockEngine::with_crawl_error("net::ERR_CONNECTION_REFUSED"));

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "config": {
                "extraction_schema": {
                    "name": "t",
                    "baseSelector": ".item",
                    "fields": [{"name": "title", "selector": "h2[[", "type": "text"}]
                }
            }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"], "schema_error");
    assert_eq!(json["field"], "fields[0]");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn invalid_content_selector_fails_before_launch() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "config": {"excluded_selector": ".ads, [["}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["field"], "config.excluded_selector");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn oversized_delay_returns_422_without_launch() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(crawl_request(json!({
            "url": "https://example.com",
            "config": {"delay_before_return_html": 1e20}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["field"], "config.delay_before_return_html");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn engine_failure_returns_500_and_closes_session() {
    let app = with_engine(MockEngine::with_crawl_error("net::ERR_CONNECTION_REFUSED"));

    let response = app
        .router
        .oneshot(crawl_request(json!({"url": "https://example.com"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "crawl_error");
    assert_eq!(
        json["message"],
        "Error crawling URL: net::ERR_CONNECTION_REFUSED"
    );
    assert_eq!(app.engine.close_count(), 1);
}
