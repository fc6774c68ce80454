// Service configuration.
// Command line flags with environment variable fallbacks.

use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;
use crate::github::GITHUB_GRAPHQL_ENDPOINT;

#[derive(Parser, Debug, Clone)]
#[command(name = "gitreleases")]
#[command(about = "Redirects to the download URL of a GitHub release asset")]
pub struct Config {
    /// Address to listen on, e.g. `0.0.0.0:8080` or `:8080`.
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen_addr: String,

    /// Personal access token used for the GraphQL API.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    #[arg(long, env = "METRICS_USERNAME")]
    pub metrics_username: String,

    #[arg(long, env = "METRICS_PASSWORD", hide_env_values = true)]
    pub metrics_password: String,

    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = GITHUB_GRAPHQL_ENDPOINT)]
    pub graphql_endpoint: String,

    /// Idle seconds before a cached resolution may be evicted.
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 600)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "CACHE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub cache_sweep_interval_secs: u64,

    /// Deadline for resolving a single request.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 2000)]
    pub request_timeout_ms: u64,
}

impl Config {
    /// Listen address usable by the socket API; a bare `:port` binds all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_max_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_sweep_interval(Duration::from_secs(self.cache_sweep_interval_secs))
    }
}
