use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sitescout_pool::Executor;
use url::Url;

use crate::config::CrawlerConfig;
use crate::errlog::ErrorLog;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::frontier::{Frontier, SharedFrontier};
use crate::policy::UrlPolicy;
use crate::sitemap::{self, Visited};

/// Highest status whose links are followed.
const MAX_FOLLOWED_STATUS: u16 = 301;

#[derive(Debug)]
pub struct CrawlReport {
    pub visited: Visited,
    /// Failed fetches and rejected statuses
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub pages: usize,
    pub errors: usize,
    pub output: PathBuf,
}

/// Crawls a site from its root, following accepted links until nothing is
/// left to fetch.
///
/// Every URL is fetched at most once per crawl. A crawler is consumed by
/// [`explore`](Self::explore) or [`crawl`](Self::crawl).
pub struct Crawler<F> {
    root: Url,
    config: CrawlerConfig,
    fetcher: F,
    errors: ErrorLog,
    frontier: Frontier<String>,
}

impl<F> Crawler<F>
where
    F: Fetcher,
{
    pub fn new(root: &str, config: CrawlerConfig, fetcher: F) -> Result<Self> {
        let root = Url::parse(root)?;
        let errors = ErrorLog::open(config.error_log.as_deref())?;
        let mut frontier = Frontier::new();
        frontier.seed(root.to_string());
        Ok(Self {
            root,
            config,
            fetcher,
            errors,
            frontier,
        })
    }

    pub fn set_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extensions = extensions.into_iter().map(Into::into).collect();
    }

    /// Overrides the extension list, matching URLs get rejected.
    pub fn set_rejection_pattern(&mut self, pattern: Option<String>) {
        self.config.rejection_pattern = pattern;
    }

    /// Adds an extra starting point, bypassing the URL policy.
    pub fn seed(&mut self, url: &str) -> bool {
        self.frontier.seed(url.to_string())
    }

    /// Seeds every `<loc>` of an existing sitemap, returns how many were new.
    pub fn seed_sitemap(&mut self, xml: &str) -> Result<usize> {
        let added = sitemap::read_locs(xml)?
            .into_iter()
            .filter(|loc| !loc.is_empty())
            .filter(|loc| self.frontier.seed(loc.clone()))
            .count();
        Ok(added)
    }

    /// Runs until the frontier is exhausted and returns the visited set.
    ///
    /// A fatal error such as [`Error::NoProxiesAvailable`] stops every worker
    /// and is returned instead.
    pub fn explore(self, executor: &dyn Executor) -> Result<CrawlReport> {
        let policy = UrlPolicy::compile(
            &self.root,
            &self.config.extensions,
            self.config.rejection_pattern.as_deref(),
        )?;

        let Self {
            fetcher,
            errors,
            frontier,
            ..
        } = self;
        let frontier = SharedFrontier::new(frontier);
        let fatal = Mutex::new(None);

        executor
            .run_workers(&|_id| {
                while let Some(claim) = frontier.claim() {
                    let stats = frontier.stats();
                    log::info!(
                        "{} pages parsed :: {} parsing processes :: {} pages in the queue",
                        stats.visited,
                        stats.in_flight,
                        stats.pending
                    );

                    let url = claim.item().clone();
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        visit(&fetcher, &policy, &errors, &url)
                    })) {
                        Ok(Ok(links)) => claim.finish(links),
                        Ok(Err(e)) => {
                            log::error!("Stopping crawl at {url}: {e}");
                            fatal
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .get_or_insert(e);
                            frontier.abort();
                        }
                        Err(_) => {
                            errors.record(format!("Panicked while crawling {url}"));
                            claim.finish(None);
                        }
                    }
                }
            })
            .map_err(Error::Worker)?;

        let fatal = fatal
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(e) = fatal {
            return Err(e);
        }

        let frontier = frontier.into_inner();
        log::info!(
            "Crawl done: {} pages, {} errors",
            frontier.visited_len(),
            errors.count()
        );

        Ok(CrawlReport {
            visited: Visited::new(frontier.into_visited()),
            errors: errors.count(),
        })
    }

    /// Explores the site then writes its sitemap to `output`.
    pub fn crawl(self, executor: &dyn Executor, output: &Path) -> Result<CrawlSummary> {
        let format = self.config.output_format;
        let report = self.explore(executor)?;
        let pages = report.visited.write(format, output)?;
        Ok(CrawlSummary {
            pages,
            errors: report.errors,
            output: output.to_path_buf(),
        })
    }
}

/// Fetches one URL and returns the links worth crawling next.
///
/// Per-URL failures are recorded and yield no links, only fatal errors are
/// returned.
fn visit<F>(
    fetcher: &F,
    policy: &UrlPolicy,
    errors: &ErrorLog,
    url: &str,
) -> Result<Vec<String>>
where
    F: Fetcher,
{
    let page = match fetcher.fetch(url) {
        Ok(page) => page,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            errors.record(e);
            return Ok(vec![]);
        }
    };

    if page.status > MAX_FOLLOWED_STATUS {
        errors.record(Error::BadStatus {
            status: page.status,
            url: url.to_string(),
        });
        return Ok(vec![]);
    }

    let links = page
        .links()
        .iter()
        .filter_map(|href| policy.resolve(&page.url, href))
        .filter_map(|link| policy.accept(&link))
        .collect();
    Ok(links)
}
