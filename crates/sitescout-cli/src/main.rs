use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, io};

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use fs_err::File;
use sitescout_crawler::{
    gunzip, Crawler, CrawlerConfig, FetchOptions, HttpFetcher, OutputFormat, ProxyPool,
};
use sitescout_pool::Dispatch;

/// Same-site crawler and proxy pool
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(name = "proxies")]
    Proxies(ProxiesArgs),
    #[clap(name = "download")]
    Download(DownloadArgs),
    #[clap(hide = true)]
    Completion,
}

/// Crawl a site from its root url and write its sitemap
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Url the crawl starts from, only urls under its origin are followed
    pub root_url: String,
    /// Path to the sitemap that will contain visited urls
    #[clap(parse(from_os_str), long, short)]
    pub output_file: PathBuf,
    /// Optional default crawler yaml configuration file
    #[clap(env = "SITESCOUT_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// Override sitemap format
    #[clap(arg_enum, long)]
    pub format: Option<OutputFormat>,
    /// Override accepted final extensions, comma separated
    #[clap(long, use_value_delimiter = true)]
    pub extensions: Option<Vec<String>>,
    /// Reject urls matching this regex instead of checking extensions
    #[clap(long)]
    pub pattern: Option<String>,
    /// Override number of concurrent page visits
    #[clap(long)]
    pub num_workers: Option<usize>,
    /// Override how workers are scheduled
    #[clap(arg_enum, long)]
    pub dispatch: Option<Dispatch>,
    /// Go through validated proxies
    #[clap(long)]
    pub proxies: bool,
    /// Override the file failed urls are appended to
    #[clap(parse(from_os_str), long)]
    pub error_log: Option<PathBuf>,
    /// Also seed the crawl with the urls of an existing sitemap (may be gzipped)
    #[clap(parse(from_os_str), long)]
    pub seed_sitemap: Option<PathBuf>,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CrawlerConfig> {
    match path {
        Some(path) => Ok(serde_yaml::from_reader(File::open(path)?)?),
        None => Ok(CrawlerConfig::default()),
    }
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = load_config(args.config.as_deref())?;
        if let Some(format) = args.format {
            conf.output_format = format;
        }
        if let Some(extensions) = &args.extensions {
            conf.extensions = extensions.clone();
        }
        if let Some(pattern) = &args.pattern {
            conf.rejection_pattern = Some(pattern.to_string());
        }
        if let Some(num_workers) = args.num_workers {
            conf.num_workers = num_workers;
        }
        if let Some(dispatch) = args.dispatch {
            conf.dispatch = dispatch;
        }
        if args.proxies {
            conf.use_proxies = true;
        }
        if let Some(error_log) = &args.error_log {
            conf.error_log = Some(error_log.clone());
        }
        Ok(conf)
    }
}

fn open_proxies(conf: &CrawlerConfig) -> anyhow::Result<Arc<ProxyPool>> {
    let executor = conf.proxy.dispatch.executor(conf.proxy.num_workers);
    let pool = ProxyPool::open(&conf.proxy, executor)?;
    if pool.is_empty() {
        anyhow::bail!(
            "No proxies available, none passed the check ({})",
            conf.proxy.cache_file.display()
        );
    }
    log::info!("{} proxies available", pool.len());
    Ok(Arc::new(pool))
}

fn http_fetcher(conf: &CrawlerConfig) -> anyhow::Result<HttpFetcher> {
    let proxies = if conf.use_proxies {
        Some(open_proxies(conf)?)
    } else {
        None
    };
    Ok(HttpFetcher::new(FetchOptions::from(conf), proxies)?)
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let conf = CrawlerConfig::try_from(&args)?;
    let executor = conf.dispatch.executor(conf.num_workers);
    let fetcher = http_fetcher(&conf)?;

    let mut crawler = Crawler::new(&args.root_url, conf, fetcher)?;
    if let Some(path) = &args.seed_sitemap {
        let raw = fs_err::read(path)?;
        let xml = if path.extension().map_or(false, |ext| ext == "gz") {
            gunzip(&raw)?
        } else {
            String::from_utf8(raw)?
        };
        let seeded = crawler.seed_sitemap(&xml)?;
        log::info!("Seeded {seeded} urls from {}", path.display());
    }

    let summary = crawler.crawl(executor.as_ref(), &args.output_file)?;
    println!(
        "{} urls written to {} ({} errors)",
        summary.pages,
        summary.output.display(),
        summary.errors
    );
    Ok(())
}

/// Load or rebuild the proxy cache and print good proxies to stdout
#[derive(Debug, clap::Args)]
pub struct ProxiesArgs {
    /// Optional default crawler yaml configuration file
    #[clap(env = "SITESCOUT_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// Discard the cache even if it is still fresh
    #[clap(long)]
    pub refresh: bool,
}

pub fn proxies(args: ProxiesArgs) -> anyhow::Result<()> {
    let conf = load_config(args.config.as_deref())?;
    if args.refresh && conf.proxy.cache_file.exists() {
        fs_err::remove_file(&conf.proxy.cache_file)?;
    }
    for proxy in open_proxies(&conf)?.iter() {
        println!("{proxy}");
    }
    Ok(())
}

/// Download a single url to a local file, skipped if the file exists
#[derive(Debug, clap::Args)]
pub struct DownloadArgs {
    #[clap(long)]
    pub url: String,
    #[clap(parse(from_os_str), long, short)]
    pub output: PathBuf,
    /// Optional default crawler yaml configuration file
    #[clap(env = "SITESCOUT_CONFIG", parse(from_os_str), long)]
    pub config: Option<PathBuf>,
    /// Go through validated proxies
    #[clap(long)]
    pub proxies: bool,
}

pub fn download(args: DownloadArgs) -> anyhow::Result<()> {
    let mut conf = load_config(args.config.as_deref())?;
    conf.use_proxies |= args.proxies;
    if http_fetcher(&conf)?.download_to(&args.url, &args.output)? {
        println!("{} -> {}", args.url, args.output.display());
    }
    Ok(())
}

fn init_logs(quiet: bool) {
    if quiet {
        return;
    }
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "sitescout_crawler=info,sitescout_pool=info");
    }
    env_logger::init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            init_logs(args.quiet);
            crawl(args)
        }
        SubCommand::Proxies(args) => {
            init_logs(false);
            proxies(args)
        }
        SubCommand::Download(args) => {
            init_logs(false);
            download(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "sitescout", &mut io::stdout());
            Ok(())
        }
    }
}
