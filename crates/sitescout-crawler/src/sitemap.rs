use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::Path;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sxd_document::{parser, Package};

use crate::error::{Error, Result};

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.sitemaps.org/schemas/sitemap/0.9 \
                               http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd";

lazy_static! {
    static ref XP_FACTORY: sxd_xpath::Factory = sxd_xpath::Factory::new();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum OutputFormat {
    /// sitemaps.org 0.9 urlset
    Xml,
    /// One URL per line
    Txt,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Xml
    }
}

/// The visited set of a finished crawl, written at most once.
#[derive(Debug, Clone, Default)]
pub struct Visited(HashSet<String>);

impl Visited {
    pub fn new(urls: HashSet<String>) -> Self {
        Self(urls)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn into_sorted(self) -> Vec<String> {
        let mut urls = self.0.into_iter().collect::<Vec<_>>();
        urls.sort_unstable();
        urls
    }

    /// The parent directory of `path` must already exist.
    pub fn write(self, format: OutputFormat, path: &Path) -> Result<usize> {
        let mut out = BufWriter::new(fs_err::File::create(path)?);
        let n = self.write_to(format, &mut out)?;
        out.flush()?;
        Ok(n)
    }

    pub fn write_to<W: Write>(self, format: OutputFormat, out: &mut W) -> Result<usize> {
        let urls = self.into_sorted();
        let n = urls.len();
        match format {
            OutputFormat::Xml => write_xml(urls, out)?,
            OutputFormat::Txt => {
                for url in urls {
                    writeln!(out, "{url}")?;
                }
            }
        }
        Ok(n)
    }
}

fn write_xml<W: Write>(urls: Vec<String>, out: &mut W) -> Result<()> {
    let package = Package::new();
    let document = package.as_document();

    let urlset = document.create_element((SITEMAP_NS, "urlset"));
    urlset.set_default_namespace_uri(Some(SITEMAP_NS));
    urlset
        .set_attribute_value((XSI_NS, "schemaLocation"), SCHEMA_LOCATION)
        .set_preferred_prefix(Some("xsi"));
    document.root().append_child(urlset);

    for url in urls {
        let entry = document.create_element((SITEMAP_NS, "url"));
        let loc = document.create_element((SITEMAP_NS, "loc"));
        loc.set_text(&url);
        entry.append_child(loc);
        urlset.append_child(entry);
    }

    sxd_document::writer::format_document(&document, out)?;
    writeln!(out)?;
    Ok(())
}

/// Every `<loc>` of a sitemap, urlset or index alike.
pub fn read_locs(xml: &str) -> Result<Vec<String>> {
    let package = parser::parse(xml).map_err(|e| Error::Xml(format!("{e}")))?;
    let document = package.as_document();

    let mut context = sxd_xpath::Context::new();
    context.set_namespace("sm", SITEMAP_NS);
    let xpath = XP_FACTORY
        .build("//sm:loc")
        .map_err(|e| Error::Xml(format!("{e}")))?
        .ok_or_else(|| Error::Xml(String::from("Missing XPath")))?;
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| Error::Xml(format!("{e}")))?;

    let mut locs = vec![];
    if let sxd_xpath::Value::Nodeset(nodes) = value {
        for node in nodes.document_order() {
            locs.push(node.string_value().trim().to_string());
        }
    }
    Ok(locs)
}
