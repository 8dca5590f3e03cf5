use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use sitescout_crawler::sitescout_pool::{anyhow, Dispatch, ThreadExecutor};
use sitescout_crawler::sources::{parse_json_feed, parse_pubproxy, parse_text_list, ProxySource};
use sitescout_crawler::{
    Error, ErrorLog, ProxyChecker, ProxyEndpoint, ProxyPool, ProxyPoolConfig, ProxyScheme,
    Result,
};

fn endpoint(s: &str) -> ProxyEndpoint {
    s.parse().unwrap()
}

/// Serves a fixed list and counts how often it was asked.
struct StaticSource {
    proxies: Vec<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl ProxySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn candidates(&self) -> anyhow::Result<Vec<ProxyEndpoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proxies.iter().map(|p| endpoint(p)).collect())
    }
}

struct BrokenSource;

impl ProxySource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn candidates(&self) -> anyhow::Result<Vec<ProxyEndpoint>> {
        anyhow::bail!("list unavailable")
    }
}

/// Private addresses relay, anything else fails.
struct PrivateOnly {
    checks: AtomicUsize,
}

impl ProxyChecker for PrivateOnly {
    fn check(&self, proxy: &ProxyEndpoint) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if proxy.host.starts_with("10.") {
            Ok(())
        } else {
            Err(Error::ProxyCheck {
                proxy: proxy.to_string(),
                reason: "not used while requesting".to_string(),
            })
        }
    }
}

fn sources(calls: &Arc<AtomicUsize>) -> Vec<Box<dyn ProxySource>> {
    vec![
        Box::new(StaticSource {
            proxies: vec!["http://10.0.0.1:8080", "http://8.8.8.8:3128", "https://10.0.0.2:443"],
            calls: calls.clone(),
        }),
        Box::new(BrokenSource),
        Box::new(StaticSource {
            proxies: vec!["http://10.0.0.1:8080", "http://10.0.0.3:80"],
            calls: calls.clone(),
        }),
    ]
}

fn config(dir: &tempfile::TempDir) -> ProxyPoolConfig {
    ProxyPoolConfig {
        cache_file: dir.path().join("cache").join("proxies.json"),
        error_log: Some(dir.path().join("proxy_errors.log")),
        ..Default::default()
    }
}

#[test]
fn endpoint_round_trip() {
    let proxy = endpoint("https://1.2.3.4:8443");
    assert_eq!(ProxyScheme::Https, proxy.scheme);
    assert_eq!("1.2.3.4", proxy.host);
    assert_eq!(8443, proxy.port);
    assert_eq!("https://1.2.3.4:8443", proxy.to_string());
}

#[test]
fn endpoint_rejects_garbage() {
    let invalid = [
        "1.2.3.4:80",
        "socks5://1.2.3.4:1080",
        "http://1.2.3.4",
        "http://:80",
        "http://h:port",
    ];
    for s in invalid {
        assert!(s.parse::<ProxyEndpoint>().is_err(), "{s} parsed");
    }
}

#[test]
fn random_on_empty_pool() {
    let pool = ProxyPool::default();
    assert!(matches!(pool.random(), Err(Error::NoProxiesAvailable)));
}

#[test]
fn random_picks_a_member() {
    let pool = ProxyPool::from_endpoints(vec![
        endpoint("http://10.0.0.1:80"),
        endpoint("http://10.0.0.2:80"),
    ]);
    for _ in 0..20 {
        let picked = pool.random().unwrap();
        assert!(pool.iter().any(|p| p == picked));
    }
}

#[test]
fn discovery_validates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let calls = Arc::new(AtomicUsize::new(0));
    let checker = PrivateOnly {
        checks: AtomicUsize::new(0),
    };

    let pool = ProxyPool::open_with(
        &config,
        &sources(&calls),
        &checker,
        Arc::new(ThreadExecutor::new(3)),
    )
    .unwrap();

    assert_eq!(2, calls.load(Ordering::SeqCst));
    // Duplicates across sources are checked once
    assert_eq!(4, checker.checks.load(Ordering::SeqCst));
    assert_eq!(
        vec![
            endpoint("http://10.0.0.1:8080"),
            endpoint("http://10.0.0.3:80"),
            endpoint("https://10.0.0.2:443"),
        ],
        pool.iter().cloned().collect::<Vec<_>>()
    );
    assert!(config.cache_file.exists());

    let logged = fs::read_to_string(dir.path().join("proxy_errors.log")).unwrap();
    assert_eq!(2, logged.lines().count());
    assert!(logged.contains("broken"));
    assert!(logged.contains("http://8.8.8.8:3128"));
}

#[test]
fn fresh_cache_skips_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let cached = ProxyPool::from_endpoints(vec![endpoint("http://192.168.1.1:3128")]);
    cached.save(&config.cache_file).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let checker = PrivateOnly {
        checks: AtomicUsize::new(0),
    };
    let pool = ProxyPool::open_with(
        &config,
        &sources(&calls),
        &checker,
        Dispatch::Threads.executor(2),
    )
    .unwrap();

    assert_eq!(0, calls.load(Ordering::SeqCst));
    assert_eq!(0, checker.checks.load(Ordering::SeqCst));
    assert_eq!(
        vec![endpoint("http://192.168.1.1:3128")],
        pool.iter().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn stale_cache_triggers_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let cached = ProxyPool::from_endpoints(vec![endpoint("http://192.168.1.1:3128")]);
    cached.save(&config.cache_file).unwrap();

    let four_days_ago = SystemTime::now() - Duration::from_secs(4 * 24 * 60 * 60);
    fs::File::options()
        .write(true)
        .open(&config.cache_file)
        .unwrap()
        .set_modified(four_days_ago)
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let checker = PrivateOnly {
        checks: AtomicUsize::new(0),
    };
    let pool = ProxyPool::open_with(
        &config,
        &sources(&calls),
        &checker,
        Dispatch::Sequential.executor(0),
    )
    .unwrap();

    assert_eq!(2, calls.load(Ordering::SeqCst));
    assert_eq!(3, pool.len());
    assert!(!pool.iter().any(|p| p.host == "192.168.1.1"));

    let reloaded = ProxyPool::load_fresh(&config.cache_file, config.ttl())
        .unwrap()
        .unwrap();
    assert_eq!(3, reloaded.len());
}

#[test]
fn discovery_caps_each_source() {
    let calls = Arc::new(AtomicUsize::new(0));
    let checker = PrivateOnly {
        checks: AtomicUsize::new(0),
    };
    let pool = ProxyPool::discover(
        &sources(&calls),
        &checker,
        Arc::new(ThreadExecutor::new(2)),
        1,
        &ErrorLog::disabled(),
    )
    .unwrap();

    // First entry of each working source, the second one is a duplicate
    assert_eq!(1, checker.checks.load(Ordering::SeqCst));
    assert_eq!(1, pool.len());
}

#[test]
fn pubproxy_lines() {
    let text = "1.2.3.4:8080\n\n5.6.7.8:3128\nnot a proxy\n";
    let (found, limited) = parse_pubproxy(text, ProxyScheme::Https);
    assert!(!limited);
    assert_eq!(
        vec![endpoint("https://1.2.3.4:8080"), endpoint("https://5.6.7.8:3128")],
        found
    );

    let text = "1.2.3.4:8080\nWe have to temporarily stop you. Too many requests\n5.6.7.8:3128";
    let (found, limited) = parse_pubproxy(text, ProxyScheme::Http);
    assert!(limited);
    assert_eq!(vec![endpoint("http://1.2.3.4:8080")], found);
}

#[test]
fn json_feed_skips_socks() {
    let text = r#"[
        {"proto": "http", "ip": "1.1.1.1", "port": 80},
        {"proto": "https", "ip": "2.2.2.2", "port": "443"},
        {"proto": "socks4", "ip": "3.3.3.3", "port": 1080},
        {"proto": "socks5", "ip": "4.4.4.4", "port": 1080},
        {"ip": "5.5.5.5", "port": 80}
    ]"#;
    assert_eq!(
        vec![endpoint("http://1.1.1.1:80"), endpoint("https://2.2.2.2:443")],
        parse_json_feed(text).unwrap()
    );
    assert!(parse_json_feed("not json").is_err());
}

#[test]
fn text_list_reads_body_lines_only() {
    let mut text = (0..6).map(|i| format!("header {i}\n")).collect::<String>();
    text.push_str("1.1.1.1:80 US-N-S\n");
    text.push_str("2.2.2.2:8080 DE-H\n");
    text.push_str("3.3.3.3:3128\n");

    assert_eq!(
        vec![endpoint("https://1.1.1.1:80"), endpoint("http://2.2.2.2:8080")],
        parse_text_list(&text)
    );
}
