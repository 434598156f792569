use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;

use crawlgate_core::testutil::MockEngine;
use crawlgate_server::routes;
use crawlgate_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

pub const PAGE: &str = r#"<html><head><title>Items</title></head><body>
    <div class="item"><h2>First</h2><a href="/one">one</a></div>
    <div class="item"><h2>Second</h2></div>
</body></html>"#;

/// Router over a mock engine, plus the engine handle for call assertions.
pub struct TestApp {
    pub router: Router,
    pub engine: MockEngine,
}

pub fn setup_test_app() -> TestApp {
    with_engine(MockEngine::new(PAGE))
}

pub fn with_engine(engine: MockEngine) -> TestApp {
    let state = Arc::new(AppState::new(engine.clone(), TEST_API_KEY));
    TestApp {
        router: routes::router(state),
        engine,
    }
}

/// `POST /crawl` with the test token and a JSON body.
pub fn crawl_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/crawl")
        .header("x-token", TEST_API_KEY)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}
