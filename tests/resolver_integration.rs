//! Integration tests for share-link resolution.
//!
//! Every network interaction goes to a local wiremock server; links are
//! resolved through `resolve_as` so local URLs can stand in for share hosts.

use std::sync::atomic::Ordering;

use onedrive_r2_core::http::HttpSettings;
use onedrive_r2_core::resolver::{
    BrowserCapability, LinkKind, LinkResolver, MetadataResolver, PageScraper, ResolutionSource,
    ResolveError, ShortLinkExpander,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::fixtures::{CannedStrategy, resolved};
use support::socket_guard::start_mock_server_or_skip;

fn settings() -> HttpSettings {
    HttpSettings::with_timeouts(2, 5)
}

fn resolver_against(server: &MockServer, browser: BrowserCapability) -> LinkResolver {
    let settings = settings();
    LinkResolver::with_strategies(
        ShortLinkExpander::new(&settings).unwrap(),
        Box::new(MetadataResolver::with_base_url(&settings, server.uri()).unwrap()),
        Box::new(PageScraper::new(&settings).unwrap()),
        browser,
    )
}

async fn mount_page(server: &MockServer, page_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_metadata_lookup_returns_name_url_and_size() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v1.0/shares/s!ABC123/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Quarterly Report.pdf",
            "size": 2048,
            "@microsoft.graph.downloadUrl": "https://dl.example/q.pdf"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let metadata = MetadataResolver::with_base_url(&settings(), mock_server.uri()).unwrap();
    let file = metadata.lookup("ABC123").await.unwrap();

    assert_eq!(file.name, "Quarterly Report.pdf");
    assert_eq!(file.download_url, "https://dl.example/q.pdf");
    assert_eq!(file.size_bytes, 2048);
    assert_eq!(
        file.source,
        ResolutionSource::Metadata {
            identifier: "ABC123".to_string()
        }
    );
}

#[tokio::test]
async fn test_metadata_lookup_without_download_url_fails() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v1.0/shares/s!NOURL/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "folder"
        })))
        .mount(&mock_server)
        .await;

    let metadata = MetadataResolver::with_base_url(&settings(), mock_server.uri()).unwrap();
    let err = metadata.lookup("NOURL").await.unwrap_err();
    assert!(matches!(err, ResolveError::Extraction { .. }), "got: {err}");
}

#[tokio::test]
async fn test_metadata_lookup_missing_name_uses_placeholder() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v1.0/shares/s!ANON/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "@microsoft.graph.downloadUrl": "https://dl.example/blob"
        })))
        .mount(&mock_server)
        .await;

    let metadata = MetadataResolver::with_base_url(&settings(), mock_server.uri()).unwrap();
    let file = metadata.lookup("ANON").await.unwrap();
    assert_eq!(file.name, "unknown_file");
    assert_eq!(file.size_bytes, 0);
}

#[tokio::test]
async fn test_scraper_finds_graph_download_url_in_page() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(
        &mock_server,
        "/share",
        r#"<html><head><title>OneDrive</title></head><script>
        var item = {"name":"holiday.mp4","@microsoft.graph.downloadUrl":"https:\/\/dl.example\/holiday.mp4?tempauth=x"};
        </script></html>"#,
    )
    .await;

    let scraper = PageScraper::new(&settings()).unwrap();
    let file = scraper
        .scrape(&format!("{}/share", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(file.name, "holiday.mp4");
    assert_eq!(file.download_url, "https://dl.example/holiday.mp4?tempauth=x");
    assert_eq!(file.size_bytes, 0);
    assert_eq!(file.source, ResolutionSource::PageScrape { depth: 0 });
}

#[tokio::test]
async fn test_scraper_checks_download_mutation() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(
        &mock_server,
        "/share",
        "<html><head><title>archive.zip - OneDrive</title></head><body>Loading</body></html>",
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/share"))
        .and(query_param("download", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .insert_header("content-length", "5120"),
        )
        .mount(&mock_server)
        .await;

    let share_url = format!("{}/share", mock_server.uri());
    let scraper = PageScraper::new(&settings()).unwrap();
    let file = scraper.scrape(&share_url).await.unwrap();

    assert_eq!(file.name, "archive.zip");
    assert_eq!(file.download_url, format!("{share_url}?download=1"));
    assert_eq!(file.source, ResolutionSource::UrlMutation { depth: 0 });
}

#[tokio::test]
async fn test_scraper_rejects_html_mutation_response() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/share", "<html><body>sign in</body></html>").await;
    Mock::given(method("HEAD"))
        .and(path("/share"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&mock_server)
        .await;

    let scraper = PageScraper::new(&settings()).unwrap();
    let err = scraper
        .scrape(&format!("{}/share", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Extraction { .. }), "got: {err}");
}

#[tokio::test]
async fn test_scraper_follows_iframe_and_inherits_name() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(
        &mock_server,
        "/share",
        r#"<html><head><title>notes.docx</title></head><body><iframe src="/embed/frame"></iframe></body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/embed/frame",
        r#"<html><body><a href="/files/notes.docx?download=1">Download</a></body></html>"#,
    )
    .await;

    let scraper = PageScraper::new(&settings()).unwrap();
    let file = scraper
        .scrape(&format!("{}/share", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(file.source, ResolutionSource::PageScrape { depth: 1 });
    assert_eq!(
        file.download_url,
        format!("{}/files/notes.docx?download=1", mock_server.uri())
    );
    assert_eq!(file.name, "notes.docx");
}

#[tokio::test]
async fn test_scraper_stops_on_iframe_loop() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/a", r#"<iframe src="/b"></iframe>"#).await;
    mount_page(&mock_server, "/b", r#"<iframe src="/a"></iframe>"#).await;

    let scraper = PageScraper::new(&settings()).unwrap();
    let err = scraper
        .scrape(&format!("{}/a", mock_server.uri()))
        .await
        .unwrap_err();

    match err {
        ResolveError::Extraction { reason, .. } => assert!(reason.contains("loop"), "{reason}"),
        other => panic!("expected extraction error, got: {other}"),
    }
}

#[tokio::test]
async fn test_scraper_respects_iframe_depth_limit() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/d0", r#"<iframe src="/d1"></iframe>"#).await;
    mount_page(&mock_server, "/d1", r#"<iframe src="/d2"></iframe>"#).await;
    mount_page(
        &mock_server,
        "/d2",
        r#"{"downloadUrl":"https://dl.example/deep.bin"}"#,
    )
    .await;

    let shallow = PageScraper::new(&settings()).unwrap().with_max_iframe_depth(1);
    let err = shallow
        .scrape(&format!("{}/d0", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("depth limit"), "got: {err}");

    let deep = PageScraper::new(&settings()).unwrap();
    let file = deep
        .scrape(&format!("{}/d0", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(file.source, ResolutionSource::PageScrape { depth: 2 });
}

#[tokio::test]
async fn test_share_page_http_error_is_transport_error() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let scraper = PageScraper::new(&settings()).unwrap();
    let err = scraper
        .scrape(&format!("{}/gone", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Transport { .. }), "got: {err}");
}

#[tokio::test]
async fn test_short_link_expands_then_uses_metadata() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/u/s"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/redir?resid=XYZ789", mock_server.uri())),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/redir", "<html></html>").await;
    Mock::given(method("GET"))
        .and(path("/v1.0/shares/s!XYZ789/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "song.flac",
            "size": 10,
            "@microsoft.graph.downloadUrl": "https://dl.example/song.flac"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let resolver = resolver_against(&mock_server, BrowserCapability::disabled());
    let file = resolver
        .resolve_as(&format!("{}/u/s", mock_server.uri()), LinkKind::ShortLink)
        .await
        .unwrap();

    assert_eq!(file.name, "song.flac");
    assert_eq!(
        file.source,
        ResolutionSource::Metadata {
            identifier: "XYZ789".to_string()
        }
    );
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_page_scrape() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v1.0/shares/s!RES1/root"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/view",
        r#"{"fileName":"data.csv","@content.downloadUrl":"https://dl.example/data.csv"}"#,
    )
    .await;

    let resolver = resolver_against(&mock_server, BrowserCapability::disabled());
    let file = resolver
        .resolve_as(
            &format!("{}/view?resid=RES1", mock_server.uri()),
            LinkKind::ConsumerLive,
        )
        .await
        .unwrap();

    assert_eq!(file.download_url, "https://dl.example/data.csv");
    assert_eq!(file.source, ResolutionSource::PageScrape { depth: 0 });
}

#[tokio::test]
async fn test_sharepoint_scrape_failure_falls_back_to_browser() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/sites/team/doc", "<html><body>app shell</body></html>").await;

    let browser = CannedStrategy::ok(
        "browser",
        resolved("plan.xlsx", "https://dl.example/plan.xlsx", 0),
    );
    let browser_calls = browser.calls();
    let browser_urls = browser.seen_urls();
    let resolver =
        resolver_against(&mock_server, BrowserCapability::with_strategy(Box::new(browser)));
    let share_url = format!("{}/sites/team/doc", mock_server.uri());

    let file = resolver
        .resolve_as(&share_url, LinkKind::SharePoint)
        .await
        .unwrap();

    assert_eq!(file.name, "plan.xlsx");
    assert_eq!(browser_calls.load(Ordering::SeqCst), 1);
    assert_eq!(browser_urls.lock().unwrap().as_slice(), [share_url]);
}

#[tokio::test]
async fn test_every_strategy_failing_reports_attempts_in_order() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/sites/team/doc", "<html></html>").await;

    let browser = CannedStrategy::failing("browser", "no download control");
    let resolver =
        resolver_against(&mock_server, BrowserCapability::with_strategy(Box::new(browser)));

    let err = resolver
        .resolve_as(
            &format!("{}/sites/team/doc", mock_server.uri()),
            LinkKind::SharePoint,
        )
        .await
        .unwrap_err();

    match err {
        ResolveError::Exhausted {
            attempted,
            last_error,
            ..
        } => {
            assert_eq!(attempted, vec!["page-scrape", "browser"]);
            assert!(last_error.contains("no download control"), "{last_error}");
        }
        other => panic!("expected exhausted error, got: {other}"),
    }
}

#[tokio::test]
async fn test_unsupported_link_rejected_without_network() {
    let resolver = LinkResolver::new(&settings(), BrowserCapability::disabled()).unwrap();
    let err = resolver
        .resolve("https://www.dropbox.com/s/abc/file.zip")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Unsupported { .. }), "got: {err}");
}

#[tokio::test]
async fn test_resolver_iframe_depth_limits_page_scrape() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_page(&mock_server, "/sites/team/embed", r#"<iframe src="/viewer"></iframe>"#).await;
    mount_page(
        &mock_server,
        "/viewer",
        r#"{"downloadUrl":"https://dl.example/embedded.docx"}"#,
    )
    .await;
    let share_url = format!("{}/sites/team/embed", mock_server.uri());

    let flat =
        LinkResolver::with_iframe_depth(&settings(), BrowserCapability::disabled(), 0).unwrap();
    let err = flat
        .resolve_as(&share_url, LinkKind::SharePoint)
        .await
        .unwrap_err();
    match err {
        ResolveError::Exhausted {
            attempted,
            last_error,
            ..
        } => {
            assert_eq!(attempted, vec!["page-scrape"]);
            assert!(last_error.contains("depth limit"), "{last_error}");
        }
        other => panic!("expected exhausted error, got: {other}"),
    }

    let nested =
        LinkResolver::with_iframe_depth(&settings(), BrowserCapability::disabled(), 1).unwrap();
    let file = nested
        .resolve_as(&share_url, LinkKind::SharePoint)
        .await
        .unwrap();
    assert_eq!(file.download_url, "https://dl.example/embedded.docx");
    assert_eq!(file.source, ResolutionSource::PageScrape { depth: 1 });
}
