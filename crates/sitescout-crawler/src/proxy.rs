use std::fmt;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sitescout_pool::{Executor, WorkerPool};

use crate::config::ProxyPoolConfig;
use crate::errlog::ErrorLog;
use crate::error::{Error, Result};
use crate::frontier::Frontier;
use crate::sources::{self, ProxySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProxyScheme {
    Http,
    Https,
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// `scheme://host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Parse(format!("Invalid proxy endpoint: {s:?}"));

        let (scheme, rest) = s.trim().split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => ProxyScheme::Http,
            "https" => ProxyScheme::Https,
            _ => return Err(invalid()),
        };
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || host.contains('/') {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;

        Ok(Self::new(scheme, host, port))
    }
}

impl TryFrom<String> for ProxyEndpoint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ProxyEndpoint> for String {
    fn from(p: ProxyEndpoint) -> Self {
        p.to_string()
    }
}

/// Tells whether a candidate proxy actually relays requests.
pub trait ProxyChecker: Send + Sync {
    fn check(&self, proxy: &ProxyEndpoint) -> Result<()>;
}

/// Asks an IP echo service, through the proxy, which address it sees.
#[derive(Debug, Clone)]
pub struct EchoChecker {
    echo_url: String,
    user_agent: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl EchoChecker {
    pub fn new(config: &ProxyPoolConfig) -> Self {
        Self {
            echo_url: config.echo_url.clone(),
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }
}

impl ProxyChecker for EchoChecker {
    fn check(&self, proxy: &ProxyEndpoint) -> Result<()> {
        let failed = |reason: String| Error::ProxyCheck {
            proxy: proxy.to_string(),
            reason,
        };

        let client = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .proxy(reqwest::Proxy::all(proxy.to_string())?)
            .build()?;

        let echoed = client
            .get(&self.echo_url)
            .send()
            .and_then(|resp| resp.text())
            .map_err(|e| failed(e.to_string()))?;

        if echoed.trim() != proxy.host {
            return Err(failed(format!(
                "not used while requesting, echo answered {:?}",
                echoed.trim()
            )));
        }
        Ok(())
    }
}

/// Proxies that passed the echo check.
///
/// Read-only once built, share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    good: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn from_endpoints<I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = ProxyEndpoint>,
    {
        let mut good = endpoints.into_iter().collect::<Vec<_>>();
        good.sort();
        good.dedup();
        Self { good }
    }

    /// Loads the cached good set, or discovers and validates a new one.
    pub fn open(config: &ProxyPoolConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;
        let sources = sources::default_sources(&http, config);
        Self::open_with(config, &sources, &EchoChecker::new(config), executor)
    }

    pub fn open_with(
        config: &ProxyPoolConfig,
        sources: &[Box<dyn ProxySource>],
        checker: &dyn ProxyChecker,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        if let Some(pool) = Self::load_fresh(&config.cache_file, config.ttl())? {
            log::info!(
                "Loaded {} proxies from {}",
                pool.len(),
                config.cache_file.display()
            );
            return Ok(pool);
        }

        let errors = ErrorLog::open(config.error_log.as_deref())?;
        let pool = Self::discover(sources, checker, executor, config.max_per_source, &errors)?;
        pool.save(&config.cache_file)?;
        Ok(pool)
    }

    /// `None` when there is no cache, or when it was stale and got deleted.
    pub fn load_fresh(path: &Path, ttl: Duration) -> Result<Option<Self>> {
        let modified = match fs_err::metadata(path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age >= ttl {
            log::info!(
                "Discarding proxy cache {} ({}s old)",
                path.display(),
                age.as_secs()
            );
            fs_err::remove_file(path)?;
            return Ok(None);
        }

        let file = fs_err::File::open(path)?;
        let good: Vec<ProxyEndpoint> = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(Self::from_endpoints(good)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs_err::create_dir_all(dir)?;
        }
        let mut out = BufWriter::new(fs_err::File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &self.good)?;
        out.flush()?;
        Ok(())
    }

    /// Gathers candidates from every source then checks them concurrently.
    ///
    /// Failed sources and failed checks are recorded and skipped.
    pub fn discover(
        sources: &[Box<dyn ProxySource>],
        checker: &dyn ProxyChecker,
        executor: Arc<dyn Executor>,
        max_per_source: usize,
        errors: &ErrorLog,
    ) -> Result<Self> {
        let mut frontier = Frontier::new();
        for source in sources {
            match source.candidates() {
                Ok(found) => {
                    let added = found
                        .into_iter()
                        .take(max_per_source)
                        .filter(|proxy| frontier.seed(proxy.clone()))
                        .count();
                    log::info!("{added} new proxy candidates from {}", source.name());
                }
                Err(e) => errors.record(format!(
                    "Skipping proxy source {} got: {e:#}",
                    source.name()
                )),
            }
        }

        let mut candidates = vec![];
        while let Ok(proxy) = frontier.pop() {
            frontier.mark_visited(proxy.clone());
            candidates.push(proxy);
        }
        let total = candidates.len();
        let checked = AtomicUsize::new(0);

        let mut pool = WorkerPool::with_executor(executor);
        pool.submit_batch(candidates);
        let outcome = pool
            .run(|proxy| {
                let good = match checker.check(&proxy) {
                    Ok(()) => Some(proxy),
                    Err(e) => {
                        errors.record(e);
                        None
                    }
                };
                let n = checked.fetch_add(1, Ordering::SeqCst) + 1;
                log::info!(
                    "{n} proxies checked :: {} proxies in the queue",
                    total.saturating_sub(n)
                );
                Ok(good)
            })
            .map_err(Error::Worker)?;

        if !outcome.is_complete() {
            log::warn!(
                "Proxy validation ended early: {} worker failures, {} unchecked",
                outcome.failures.len(),
                outcome.unprocessed
            );
        }

        let pool = Self::from_endpoints(outcome.results.into_iter().flatten());
        log::info!("{} proxies out of {total} passed the check", pool.len());
        Ok(pool)
    }

    pub fn random(&self) -> Result<&ProxyEndpoint> {
        self.good
            .choose(&mut rand::thread_rng())
            .ok_or(Error::NoProxiesAvailable)
    }

    pub fn len(&self) -> usize {
        self.good.len()
    }

    pub fn is_empty(&self) -> bool {
        self.good.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEndpoint> {
        self.good.iter()
    }
}
