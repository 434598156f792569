use clap::Parser;

use crawlgate_core::AppError;

/// Process configuration, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "crawlgate-server", version, about = "Authenticated web crawling API")]
pub struct ServerConfig {
    /// Secret expected in the `x-token` header.
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    #[arg(long, env = "CRAWLGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "CRAWLGATE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "CRAWLGATE_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Allow crawling loopback, private and link-local addresses.
    #[arg(long, env = "CRAWLGATE_ALLOW_PRIVATE_URLS", default_value_t = false)]
    pub allow_private_urls: bool,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_token.trim().is_empty() {
            return Err(AppError::Config("API_TOKEN must not be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(AppError::Config(
                "CRAWLGATE_MAX_BODY_BYTES must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        ServerConfig::try_parse_from(std::iter::once("crawlgate-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--api-token", "secret"]);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert!(!config.allow_private_urls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override() {
        let config = parse(&[
            "--api-token",
            "secret",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--allow-private-urls",
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert!(config.allow_private_urls);
    }

    #[test]
    fn test_blank_token_rejected() {
        let config = parse(&["--api-token", "   "]);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
