use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

lazy_static! {
    static ref LINKS: Selector = Selector::parse("a[href]").unwrap();
    static ref IMAGES: Selector = Selector::parse("img[src]").unwrap();
}

/// A fetched page, parsed on demand.
#[derive(Debug, Clone)]
pub struct Page {
    /// Where the body was actually served from, after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn new(url: Url, status: u16, body: impl Into<String>) -> Self {
        Self {
            url,
            status,
            body: body.into(),
        }
    }

    /// Raw `href` values of every anchor.
    pub fn links(&self) -> Vec<String> {
        extract_links(&self.body)
    }

    /// Image sources, made absolute against the page URL.
    pub fn images(&self) -> Vec<String> {
        extract_images(&self.body)
            .into_iter()
            .filter_map(|src| self.url.join(&src).ok())
            .map(String::from)
            .collect()
    }
}

pub fn extract_links(html: &str) -> Vec<String> {
    select_attr(html, &LINKS, "href")
}

pub fn extract_images(html: &str) -> Vec<String> {
    select_attr(html, &IMAGES, "src")
}

fn select_attr(html: &str, selector: &Selector, attr: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::to_string)
        .collect()
}
