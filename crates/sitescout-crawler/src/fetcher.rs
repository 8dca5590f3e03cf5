use std::collections::HashMap;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flate2::read::GzDecoder;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::CONTENT_TYPE;

use crate::config::CrawlerConfig;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::proxy::{ProxyEndpoint, ProxyPool};

/// Something able to GET a URL.
///
/// Errors are per URL, callers log them and move on.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Page>;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Deadline of the switch-proxy-and-retry loop
    pub proxy_retry: Duration,
}

impl From<&CrawlerConfig> for FetchOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            proxy_retry: config.proxy_retry(),
        }
    }
}

/// Blocking HTTP fetcher, optionally going through a [`ProxyPool`].
#[derive(Debug)]
pub struct HttpFetcher {
    options: FetchOptions,
    direct: Client,
    proxies: Option<Arc<ProxyPool>>,
    proxied: Mutex<HashMap<ProxyEndpoint, Client>>,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions, proxies: Option<Arc<ProxyPool>>) -> Result<Self> {
        let direct = client_builder(&options).build()?;
        Ok(Self {
            options,
            direct,
            proxies,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn proxied_client(&self, proxy: &ProxyEndpoint) -> Result<Client> {
        let mut clients = self.proxied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }
        let client = client_builder(&self.options)
            .proxy(reqwest::Proxy::all(proxy.to_string())?)
            .build()?;
        clients.insert(proxy.clone(), client.clone());
        Ok(client)
    }

    fn send(&self, url: &str) -> Result<Response> {
        let pool = match &self.proxies {
            Some(pool) => pool,
            None => return Ok(self.direct.get(url).send()?),
        };

        let deadline = Instant::now() + self.options.proxy_retry;
        loop {
            let proxy = pool.random()?;
            match self.proxied_client(proxy)?.get(url).send() {
                Ok(resp) => return Ok(resp),
                Err(e) if is_transient(&e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::TransientNetwork(format!(
                            "Giving up on {url} after {:?}, last proxy {proxy} got: {e}",
                            self.options.proxy_retry
                        )));
                    }
                    log::debug!("Proxy {proxy} failed for {url}, switching: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Streams `url` into `path`, returns `false` when the file already exists.
    ///
    /// The body goes to a `.part` sibling first, so an interrupted download
    /// never leaves a truncated file at `path`.
    pub fn download_to(&self, url: &str, path: &Path) -> Result<bool> {
        if path.exists() {
            log::info!("{} - file already exists", path.display());
            return Ok(false);
        }
        let mut resp = self.send(url)?.error_for_status()?;

        let partial = partial_path(path);
        if let Err(e) = stream_to(&mut resp, &partial) {
            fs_err::remove_file(&partial).ok();
            return Err(e);
        }
        fs_err::rename(&partial, path)?;
        Ok(true)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Page> {
        into_page(self.send(url)?)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn stream_to(resp: &mut Response, path: &Path) -> Result<()> {
    let mut file = fs_err::File::create(path)?;
    resp.copy_to(&mut file)?;
    Ok(())
}

fn client_builder(options: &FetchOptions) -> ClientBuilder {
    Client::builder()
        .user_agent(&options.user_agent)
        .connect_timeout(options.connect_timeout)
        .timeout(options.read_timeout)
        .gzip(true)
        .deflate(true)
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

fn into_page(resp: Response) -> Result<Page> {
    let url = resp.url().clone();
    let status = resp.status().as_u16();
    let gzipped = matches!(
        resp.headers().get(CONTENT_TYPE),
        Some(c) if c == "application/x-gzip" || c == "application/gzip"
    );
    let body = if gzipped {
        gunzip(&resp.bytes()?)?
    } else {
        resp.text()?
    };
    Ok(Page { url, status, body })
}

pub fn gunzip(compressed: &[u8]) -> Result<String> {
    let mut gz = GzDecoder::new(compressed);
    let mut page = String::new();
    gz.read_to_string(&mut page)
        .map_err(|e| Error::Parse(format!("Invalid gzip body: {e}")))?;
    Ok(page)
}
