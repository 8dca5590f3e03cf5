use sitescout_crawler::{extract_links, gunzip, Page};
use url::Url;

const HTML: &str = r#"<html>
<head><title>Biserica de lemn</title></head>
<body>
  <a href="/judete/cluj.htm">Cluj</a>
  <a name="anchor-only">no href</a>
  <a href="../index.php">Acasa</a>
  <img src="img/front.jpg">
  <img alt="no src">
  <img src="http://cdn.x.test/side.jpg">
</body>
</html>"#;

#[test]
fn links_are_raw_hrefs() {
    assert_eq!(vec!["/judete/cluj.htm", "../index.php"], extract_links(HTML));
}

#[test]
fn images_are_absolute() {
    let page = Page::new(Url::parse("http://x.test/biserici/lemn.htm").unwrap(), 200, HTML);
    assert_eq!(
        vec!["http://x.test/biserici/img/front.jpg", "http://cdn.x.test/side.jpg"],
        page.images()
    );
}

#[test]
fn gunzip_body() {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(b"<urlset></urlset>").unwrap();
    let compressed = gz.finish().unwrap();

    assert_eq!("<urlset></urlset>", gunzip(&compressed).unwrap());
    assert!(gunzip(b"plain").is_err());
}
