/// Shared application state, available to all route handlers via `State<Arc<AppState<E>>>`.
pub struct AppState<E> {
    /// Engine used to launch one session per crawl request.
    pub engine: E,
    /// Secret every `x-token` header is compared against.
    pub api_token: String,
}

impl<E> AppState<E> {
    pub fn new(engine: E, api_token: impl Into<String>) -> Self {
        Self {
            engine,
            api_token: api_token.into(),
        }
    }
}
