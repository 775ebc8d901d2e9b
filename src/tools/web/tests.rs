use super::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title> Rust   Weekly </title>
  <meta name="description" content=" News about Rust ">
  <script>var tracking = "nope";</script>
</head>
<body>
  <nav><a href="/home">Home</a><h2>Menu</h2></nav>
  <main>
    <h1>Release notes</h1>
    <p>The compiler got   faster.</p>
    <div class="ad">Buy things</div>
    <p>See <a href="https://example.com/post">the post</a>.</p>
    <img src="/chart.png" alt="chart" title="Speed">
    <img src="/tracker.gif">
  </main>
  <footer>Copyright</footer>
</body>
</html>"#;

fn web_config(server: &MockServer) -> WebConfig {
    WebConfig {
        searxng_url: format!("{}/", server.uri()),
        max_results: 2,
        ..WebConfig::default()
    }
}

fn tool<'a>(adapter: &'a Adapter, name: &str) -> &'a Arc<dyn Tool> {
    adapter
        .tools
        .iter()
        .find(|t| t.name() == name)
        .unwrap_or_else(|| panic!("missing tool {name}"))
}

#[test]
fn test_extract_page_skips_boilerplate() {
    let page = extract_page("https://example.com", PAGE, 5000).unwrap();
    assert_eq!(page["url"], "https://example.com");
    assert_eq!(page["title"], "Rust Weekly");
    assert_eq!(page["metaDescription"], "News about Rust");

    let content = page["content"].as_str().unwrap();
    assert_eq!(
        content,
        "Release notes The compiler got faster. See the post ."
    );
    assert!(!content.contains("tracking"));
    assert!(!content.contains("Buy things"));
    assert!(!content.contains("Menu"));
    assert_eq!(page["wordCount"], 10);
    assert!(page["scrapedAt"].is_string());
}

#[test]
fn test_extract_page_structure() {
    let page = extract_page("https://example.com", PAGE, 5000).unwrap();
    assert_eq!(
        page["headings"],
        json!([{"level": 1, "text": "Release notes"}])
    );
    assert_eq!(
        page["links"],
        json!([{"text": "the post", "href": "https://example.com/post"}])
    );
    assert_eq!(
        page["images"],
        json!([
            {"src": "/chart.png", "alt": "chart", "title": "Speed"},
            {"src": "/tracker.gif", "alt": "", "title": ""}
        ])
    );
}

#[test]
fn test_extract_page_cuts_content() {
    let page = extract_page("https://example.com", PAGE, 7).unwrap();
    assert_eq!(page["content"], "Release");
    assert_eq!(page["wordCount"], 10);
}

#[test]
fn test_extract_page_cuts_multibyte_content_by_chars() {
    let html = "<html><body><p>日本語のテキストです</p></body></html>";
    let page = extract_page("https://example.com", html, 5).unwrap();
    assert_eq!(page["content"], "日本語のテ");
}

#[test]
fn test_extract_page_falls_back_to_body() {
    let html = "<html><body><p>just   text</p><aside>side</aside></body></html>";
    let page = extract_page("https://example.com", html, 100).unwrap();
    assert_eq!(page["content"], "just text");
    assert_eq!(page["title"], "");
    assert_eq!(page["metaDescription"], "");
}

#[test]
fn test_extract_page_content_class_fallback() {
    let html = r#"<html><body><p>outside</p><div class="main-content">inside</div></body></html>"#;
    let page = extract_page("https://example.com", html, 100).unwrap();
    assert_eq!(page["content"], "inside");
}

#[tokio::test]
async fn test_get_links_returns_top_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("format", "json"))
        .and(query_param("categories", "general,web"))
        .and(query_param("engines", "bing,duckduckgo,brave"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "A", "url": "https://a.example", "content": "first", "engine": "bing", "score": 3},
                {"title": "B", "url": "https://b.example", "content": "second", "engine": "brave"},
                {"title": "C", "url": "https://c.example", "content": "third", "engine": "bing"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&web_config(&server));
    let result = tool(&adapter, "get_links")
        .execute(json!({"query": "rust"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(
        result.content,
        vec![ToolContent::Json(json!([
            {"title": "A", "url": "https://a.example", "content": "first", "engine": "bing"},
            {"title": "B", "url": "https://b.example", "content": "second", "engine": "brave"}
        ]))]
    );
}

#[tokio::test]
async fn test_get_links_no_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let adapter = adapter(&web_config(&server));
    let result = tool(&adapter, "get_links")
        .execute(json!({"query": "zzqx", "categories": "news"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text(), "No results found for \"zzqx\"");
}

#[tokio::test]
async fn test_get_links_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = adapter(&web_config(&server));
    let result = tool(&adapter, "get_links")
        .execute(json!({"query": "rust"}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.text(),
        "Error fetching search results: HTTP error! status: 500"
    );
}

#[tokio::test]
async fn test_scrape_links_mixes_pages_and_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let ok = format!("{}/ok", server.uri());
    let missing = format!("{}/missing", server.uri());
    let adapter = adapter(&web_config(&server));
    let result = tool(&adapter, "scrape_links")
        .execute(json!({"links": [ok, missing, "ftp://example.com/file"]}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content.len(), 3);

    let pages: Vec<&Value> = result
        .content
        .iter()
        .map(|c| match c {
            ToolContent::Json(v) => v,
            other => panic!("expected json, got {other:?}"),
        })
        .collect();
    assert_eq!(pages[0]["url"], ok.as_str());
    assert_eq!(pages[0]["title"], "Rust Weekly");
    assert!(pages[0].get("error").is_none());

    assert_eq!(pages[1]["url"], missing.as_str());
    assert_eq!(pages[1]["error"], "HTTP error! status: 404");
    assert!(pages[1]["scrapedAt"].is_string());

    assert!(
        pages[2]["error"]
            .as_str()
            .unwrap()
            .contains("unsupported URL scheme 'ftp'")
    );
}

#[tokio::test]
async fn test_scrape_links_requires_links() {
    let adapter = adapter(&WebConfig::default());
    let result = tool(&adapter, "scrape_links")
        .execute(json!({"links": []}))
        .await
        .unwrap();
    assert!(result.is_error);
}
