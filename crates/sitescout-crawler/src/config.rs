use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitescout_pool::Dispatch;

use crate::sitemap::OutputFormat;

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// How long to keep switching proxies before giving up on a URL
    #[serde(default = "default_proxy_retry_secs")]
    pub proxy_retry_secs: u64,

    #[serde(default = "sitescout_pool::default_num_workers")]
    pub num_workers: usize,

    #[serde(default)]
    pub dispatch: Dispatch,

    /// Final path extensions worth crawling
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Replaces the extension check, matching URLs are rejected
    #[serde(default)]
    pub rejection_pattern: Option<String>,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_crawler_error_log")]
    pub error_log: Option<PathBuf>,

    #[serde(default)]
    pub use_proxies: bool,

    #[serde(default)]
    pub proxy: ProxyPoolConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            proxy_retry_secs: default_proxy_retry_secs(),
            num_workers: sitescout_pool::default_num_workers(),
            dispatch: Dispatch::default(),
            extensions: default_extensions(),
            rejection_pattern: None,
            output_format: OutputFormat::default(),
            error_log: default_crawler_error_log(),
            use_proxies: false,
            proxy: ProxyPoolConfig::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn proxy_retry(&self) -> Duration {
        Duration::from_secs(self.proxy_retry_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyPoolConfig {
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Age after which the cached good set is thrown away
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_proxy_workers")]
    pub num_workers: usize,

    #[serde(default)]
    pub dispatch: Dispatch,

    /// Service answering with the IP address the request came from
    #[serde(default = "default_echo_url")]
    pub echo_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_check_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,

    #[serde(default = "default_pubproxy_rounds")]
    pub pubproxy_rounds: usize,

    #[serde(default = "default_proxy_error_log")]
    pub error_log: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            ttl_secs: default_ttl_secs(),
            num_workers: default_proxy_workers(),
            dispatch: Dispatch::default(),
            echo_url: default_echo_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_check_timeout_secs(),
            max_per_source: default_max_per_source(),
            pubproxy_rounds: default_pubproxy_rounds(),
            error_log: default_proxy_error_log(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProxyPoolConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_user_agent() -> String {
    String::from(CHROME_UA)
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    20
}

fn default_check_timeout_secs() -> u64 {
    10
}

fn default_proxy_retry_secs() -> u64 {
    60
}

fn default_extensions() -> Vec<String> {
    vec![String::from("htm"), String::from("php")]
}

fn default_crawler_error_log() -> Option<PathBuf> {
    Some(PathBuf::from("crawler_errors.log"))
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("assets/proxies.json")
}

fn default_ttl_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_proxy_workers() -> usize {
    10
}

fn default_echo_url() -> String {
    String::from("https://canihazip.com/s")
}

fn default_max_per_source() -> usize {
    300
}

fn default_pubproxy_rounds() -> usize {
    10
}

fn default_proxy_error_log() -> Option<PathBuf> {
    Some(PathBuf::from("proxy_list_errors.log"))
}
