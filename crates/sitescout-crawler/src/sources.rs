use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::ProxyPoolConfig;
use crate::proxy::{ProxyEndpoint, ProxyScheme};

const PUBPROXY_URL: &str = "http://pubproxy.com/api/proxy?limit=20&format=txt";
const PUBPROXY_RATE_LIMITED: &str = "We have to temporarily stop you";
const JSON_FEED_URL: &str =
    "https://raw.githubusercontent.com/stamparm/aux/master/fetch-some-list.txt";
const TEXT_LIST_URL: &str =
    "https://raw.githubusercontent.com/clarketm/proxy-list/master/proxy-list.txt";

/// A public list of proxy candidates.
pub trait ProxySource: Send + Sync {
    fn name(&self) -> &str;

    fn candidates(&self) -> Result<Vec<ProxyEndpoint>>;
}

pub fn default_sources(http: &Client, config: &ProxyPoolConfig) -> Vec<Box<dyn ProxySource>> {
    vec![
        Box::new(PubProxy {
            http: http.clone(),
            rounds: config.pubproxy_rounds,
        }),
        Box::new(JsonFeed {
            http: http.clone(),
            url: JSON_FEED_URL.to_string(),
        }),
        Box::new(TextList {
            http: http.clone(),
            url: TEXT_LIST_URL.to_string(),
        }),
    ]
}

/// pubproxy.com, alternating http and https batches until rate limited.
#[derive(Debug, Clone)]
pub struct PubProxy {
    pub http: Client,
    pub rounds: usize,
}

impl ProxySource for PubProxy {
    fn name(&self) -> &str {
        "pubproxy"
    }

    fn candidates(&self) -> Result<Vec<ProxyEndpoint>> {
        let mut found = vec![];
        for round in 0..self.rounds {
            let scheme = if round % 2 == 1 {
                ProxyScheme::Https
            } else {
                ProxyScheme::Http
            };
            let text = self
                .http
                .get(format!("{PUBPROXY_URL}&type={scheme}"))
                .send()?
                .text()?;
            let (batch, rate_limited) = parse_pubproxy(&text, scheme);
            found.extend(batch);
            if rate_limited {
                log::info!("pubproxy rate limit hit after {} rounds", round + 1);
                break;
            }
        }
        Ok(found)
    }
}

/// JSON array of `{"proto", "ip", "port"}` objects.
#[derive(Debug, Clone)]
pub struct JsonFeed {
    pub http: Client,
    pub url: String,
}

impl ProxySource for JsonFeed {
    fn name(&self) -> &str {
        &self.url
    }

    fn candidates(&self) -> Result<Vec<ProxyEndpoint>> {
        let text = self.http.get(&self.url).send()?.text()?;
        parse_json_feed(&text)
    }
}

/// Plain text `ip:port CC-A-S` lines after a short header.
#[derive(Debug, Clone)]
pub struct TextList {
    pub http: Client,
    pub url: String,
}

impl ProxySource for TextList {
    fn name(&self) -> &str {
        &self.url
    }

    fn candidates(&self) -> Result<Vec<ProxyEndpoint>> {
        let text = self.http.get(&self.url).send()?.text()?;
        Ok(parse_text_list(&text))
    }
}

/// One `ip:port` per line, returns whether the rate limit message was seen.
pub fn parse_pubproxy(text: &str, scheme: ProxyScheme) -> (Vec<ProxyEndpoint>, bool) {
    let mut found = vec![];
    for line in text.lines() {
        if line.contains(PUBPROXY_RATE_LIMITED) {
            return (found, true);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match format!("{scheme}://{line}").parse::<ProxyEndpoint>() {
            Ok(proxy) => found.push(proxy),
            Err(e) => log::debug!("Skipping pubproxy line: {e}"),
        }
    }
    (found, false)
}

/// SOCKS entries and entries missing a field are skipped.
pub fn parse_json_feed(text: &str) -> Result<Vec<ProxyEndpoint>> {
    let entries: Vec<Value> = serde_json::from_str(text)?;
    let found = entries
        .iter()
        .filter_map(|entry| {
            let proto = entry.get("proto")?.as_str()?;
            if proto.starts_with("socks") {
                return None;
            }
            let ip = entry.get("ip")?.as_str()?;
            let port = match entry.get("port")? {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => return None,
            };
            format!("{proto}://{ip}:{port}").parse::<ProxyEndpoint>().ok()
        })
        .collect();
    Ok(found)
}

/// Only lines 6 to 304 hold proxies; a trailing `S` in the flags means https.
pub fn parse_text_list(text: &str) -> Vec<ProxyEndpoint> {
    text.lines()
        .enumerate()
        .filter(|(n, _)| (6..305).contains(n))
        .filter_map(|(_, line)| {
            let mut fields = line.split(' ');
            let addr = fields.next()?;
            let flags = fields.next()?;
            let scheme = if flags.ends_with('S') {
                ProxyScheme::Https
            } else {
                ProxyScheme::Http
            };
            format!("{scheme}://{addr}").parse::<ProxyEndpoint>().ok()
        })
        .collect()
}
