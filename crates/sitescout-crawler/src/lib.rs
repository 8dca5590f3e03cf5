mod config;
mod crawler;
mod errlog;
mod error;
mod fetcher;
mod frontier;
mod page;
mod policy;
mod proxy;
pub mod sitemap;
pub mod sources;

pub use config::{CrawlerConfig, ProxyPoolConfig};
pub use crawler::{CrawlReport, CrawlSummary, Crawler};
pub use errlog::ErrorLog;
pub use error::{Error, Result};
pub use fetcher::{gunzip, FetchOptions, Fetcher, HttpFetcher};
pub use frontier::{Claim, Frontier, FrontierStats, SharedFrontier};
pub use page::{extract_images, extract_links, Page};
pub use policy::{netloc, strip_fragment, UrlPolicy};
pub use proxy::{EchoChecker, ProxyChecker, ProxyEndpoint, ProxyPool, ProxyScheme};
pub use sitemap::{OutputFormat, Visited};

pub use sitescout_pool;
