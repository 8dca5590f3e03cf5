use std::fmt::Write;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::Result;

lazy_static! {
    static ref FINAL_EXTENSION: Regex = Regex::new(r"\.(\w+)$").unwrap();
}

const MAX_DOTS: usize = 3;

#[derive(Debug, Clone)]
enum Rejection {
    /// Reject a final `.ext` that isn't in the list
    Extensions(Vec<String>),
    /// Reject anything the pattern matches
    Pattern(Regex),
}

/// Decides which discovered links are worth crawling.
///
/// The origin check is a substring test of the link's network location
/// against the root URL, not a strict host comparison. A root of
/// `http://example.com/notexample.com` therefore also accepts links on
/// `notexample.com`.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    root: Url,
    rejection: Rejection,
}

impl UrlPolicy {
    /// An explicit `pattern` takes precedence over `extensions`.
    pub fn compile(root: &Url, extensions: &[String], pattern: Option<&str>) -> Result<Self> {
        let rejection = match pattern {
            Some(pattern) => Rejection::Pattern(Regex::new(pattern)?),
            None => Rejection::Extensions(extensions.to_vec()),
        };
        Ok(Self {
            root: root.clone(),
            rejection,
        })
    }

    /// Returns the fragment-less URL when it passes every check.
    pub fn accept(&self, url: &str) -> Option<String> {
        let url = strip_fragment(url);

        if url.matches('.').count() > MAX_DOTS {
            return None;
        }

        let parsed = Url::parse(url).ok()?;
        match netloc(&parsed) {
            Some(netloc) if self.root.as_str().contains(&netloc) => (),
            _ => return None,
        }

        let rejected = match &self.rejection {
            Rejection::Extensions(allowed) => FINAL_EXTENSION
                .captures(url)
                .map(|c| !allowed.iter().any(|ext| ext == &c[1]))
                .unwrap_or(false),
            Rejection::Pattern(re) => re.is_match(url),
        };
        if rejected {
            return None;
        }

        Some(url.to_string())
    }

    pub fn is_valid(&self, url: &str) -> bool {
        self.accept(url).is_some()
    }

    /// Turns an href found on `page` into an absolute URL.
    ///
    /// Leading `../` segments are replaced by the crawl root, anything else
    /// relative is resolved against the page itself.
    pub fn resolve(&self, page: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        let resolved = if href.starts_with("../") {
            self.root.join(href.trim_start_matches("../"))
        } else {
            page.join(href)
        };
        resolved.ok().map(String::from)
    }
}

pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(i) => &url[..i],
        None => url,
    }
}

/// `[user[:password]@]host[:port]`, `None` when the URL has no host.
pub fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let mut netloc = String::new();
    if !url.username().is_empty() {
        netloc.push_str(url.username());
        if let Some(password) = url.password() {
            netloc.push(':');
            netloc.push_str(password);
        }
        netloc.push('@');
    }
    netloc.push_str(host);
    if let Some(port) = url.port() {
        write!(netloc, ":{port}").ok();
    }
    Some(netloc)
}
