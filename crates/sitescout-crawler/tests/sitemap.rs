use std::collections::HashSet;

use sitescout_crawler::sitemap::{read_locs, SITEMAP_NS};
use sitescout_crawler::{OutputFormat, Visited};

fn visited(urls: &[&str]) -> Visited {
    Visited::new(urls.iter().map(|u| u.to_string()).collect::<HashSet<_>>())
}

#[test]
fn txt_is_sorted_one_per_line() {
    let mut out = vec![];
    let n = visited(&["http://x.test/b.htm", "http://x.test/", "http://x.test/a.php"])
        .write_to(OutputFormat::Txt, &mut out)
        .unwrap();

    assert_eq!(3, n);
    assert_eq!(
        "http://x.test/\nhttp://x.test/a.php\nhttp://x.test/b.htm\n",
        String::from_utf8(out).unwrap()
    );
}

#[test]
fn xml_is_a_urlset() {
    let mut out = vec![];
    visited(&["http://x.test/", "http://x.test/q.php?a=1&b=2"])
        .write_to(OutputFormat::Xml, &mut out)
        .unwrap();
    let xml = String::from_utf8(out).unwrap();

    assert!(xml.contains("urlset"));
    assert!(xml.contains(SITEMAP_NS));
    assert!(xml.contains("xsi:schemaLocation="));
    assert!(xml.contains("xmlns:xsi='http://www.w3.org/2001/XMLSchema-instance'"));
    assert!(!xml.contains("autons"));
    assert!(xml.contains("a=1&amp;b=2"));
    assert_eq!(
        vec!["http://x.test/", "http://x.test/q.php?a=1&b=2"],
        read_locs(&xml).unwrap()
    );
}

#[test]
fn empty_urlset() {
    let mut out = vec![];
    assert_eq!(0, Visited::default().write_to(OutputFormat::Xml, &mut out).unwrap());
    assert!(read_locs(&String::from_utf8(out).unwrap()).unwrap().is_empty());
}

#[test]
fn reads_sitemap_index() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc> http://x.test/sitemap-1.xml </loc></sitemap>
  <sitemap><loc>http://x.test/sitemap-2.xml</loc></sitemap>
</sitemapindex>"#;
    assert_eq!(
        vec!["http://x.test/sitemap-1.xml", "http://x.test/sitemap-2.xml"],
        read_locs(xml).unwrap()
    );
}

#[test]
fn unparsable_sitemap() {
    assert!(read_locs("<urlset><url>").is_err());
}
