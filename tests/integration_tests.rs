use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use media_resolver::core::{Dialect, MediaType, ProbeExecutor, ReqwestTransport};
use media_resolver::service::ResolveResponse;
use media_resolver::{server, Config, ProviderRegistry, ProviderSpec, ResolutionService, ResolveError};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";

fn service(search: Vec<ProviderSpec>, resolve: Vec<ProviderSpec>, timeout: Duration) -> ResolutionService {
    let registry = ProviderRegistry::new(search, resolve).expect("valid registry");
    let transport = ReqwestTransport::new("media-resolver-tests").expect("http client");
    ResolutionService::new(
        Arc::new(registry),
        ProbeExecutor::new(Arc::new(transport), timeout),
    )
}

fn resolver(server: &MockServer, name: &str) -> ProviderSpec {
    ProviderSpec::new(name, &format!("{}/{}?url={{query}}", server.uri(), name))
}

fn searcher(server: &MockServer, name: &str) -> ProviderSpec {
    ProviderSpec::new(name, &format!("{}/{}?query={{query}}", server.uri(), name))
}

async fn mount_json(server: &MockServer, route: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_succeeds_when_other_provider_times_out() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(
        &mock,
        "/A",
        200,
        json!({"result": {"url": "https://cdn.example/a.mp3", "title": "Song"}}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/B"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": "https://cdn.example/b.mp3"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock)
        .await;

    let service = service(
        vec![],
        vec![resolver(&mock, "A"), resolver(&mock, "B")],
        Duration::from_millis(500),
    );

    let started = Instant::now();
    let outcome = assert_ok!(service.resolve(WATCH_URL, None).await);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);

    let response = serde_json::to_value(ResolveResponse::from(outcome))?;
    assert_eq!(
        response,
        json!({
            "success": true,
            "downloads": [{"title": "Song", "url": "https://cdn.example/a.mp3", "source": "A"}]
        })
    );

    Ok(())
}

#[tokio::test]
async fn test_bare_id_is_reconstructed_before_probing() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ytmp3"))
        .and(query_param("url", WATCH_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"title": "Song", "type": "audio", "download_url": "https://cdn.example/song.mp3"}
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let service = service(
        vec![],
        vec![resolver(&mock, "ytmp3").with_dialect(Dialect::Nested)],
        Duration::from_secs(5),
    );

    let outcome = service.resolve("abc123", None).await?;

    assert!(outcome.success);
    assert_eq!(outcome.results[0].url, "https://cdn.example/song.mp3");
    assert_eq!(outcome.results[0].media_type, Some(MediaType::Audio));

    Ok(())
}

#[tokio::test]
async fn test_identical_links_are_deduplicated_in_registry_order() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": "https://cdn.example/same.mp4", "title": "First"}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock)
        .await;
    mount_json(&mock, "/second", 200, json!({"downloadUrl": "https://cdn.example/same.mp4"})).await;
    mount_json(&mock, "/third", 200, json!({"data": {"link": "https://cdn.example/other.mp4"}})).await;

    let service = service(
        vec![],
        vec![
            resolver(&mock, "first"),
            resolver(&mock, "second"),
            resolver(&mock, "third"),
        ],
        Duration::from_secs(5),
    );

    let outcome = service.resolve(WATCH_URL, None).await?;

    let links: Vec<_> = outcome
        .results
        .iter()
        .map(|r| (r.url.as_str(), r.source_provider.as_str()))
        .collect();
    assert_eq!(
        links,
        vec![
            ("https://cdn.example/same.mp4", "first"),
            ("https://cdn.example/other.mp4", "third"),
        ]
    );
    assert_eq!(outcome.diagnostics.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_provider_cookies_do_not_carry_over_between_requests() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sticky"))
        .and(header_exists("cookie"))
        .respond_with(ResponseTemplate::new(200).set_body_string("LEAKED"))
        .with_priority(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/sticky"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=user1; Path=/")
                .set_body_json(json!({"url": "https://cdn.example/a.mp3"})),
        )
        .mount(&mock)
        .await;

    let service = service(vec![], vec![resolver(&mock, "sticky")], Duration::from_secs(5));

    let first = service.resolve("abc123", None).await?;
    assert!(first.success);

    let second = service.resolve("def456", None).await?;
    assert!(second.success, "diagnostics: {:?}", second.diagnostics);

    let requests = mock.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| !r.headers.contains_key("cookie")));

    Ok(())
}

#[tokio::test]
async fn test_all_providers_failing_reports_every_probe() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock)
        .await;
    let unreachable = ProviderSpec::new("offline", "http://127.0.0.1:9/dl?url={query}");

    let service = service(
        vec![],
        vec![resolver(&mock, "broken"), resolver(&mock, "slow"), unreachable],
        Duration::from_millis(500),
    );

    let outcome = service.resolve(WATCH_URL, None).await?;

    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 3);
    assert_eq!(outcome.diagnostics[0].http_status, Some(500));
    assert_eq!(
        outcome.diagnostics[0].body_excerpt.as_deref(),
        Some("Internal Server Error")
    );
    assert!(outcome.diagnostics[1].timed_out);
    assert_eq!(outcome.diagnostics[2].status, "network_error");
    assert_eq!(
        outcome.failure(),
        Some(ResolveError::NoUsableResult { probed: 3, faulted: 3 })
    );

    let response = ResolveResponse::from(outcome);
    assert_eq!(response.error.as_deref(), Some("all 3 providers failed"));
    assert_eq!(response.diagnostics.map(|d| d.len()), Some(3));

    Ok(())
}

#[tokio::test]
async fn test_unrecognized_payloads_are_told_apart_from_outages() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(&mock, "/quota", 200, json!({"status": false, "message": "daily limit reached"})).await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock)
        .await;

    let service = service(
        vec![],
        vec![resolver(&mock, "quota"), resolver(&mock, "html")],
        Duration::from_secs(5),
    );

    let outcome = service.resolve(WATCH_URL, None).await?;

    assert!(!outcome.success);
    assert_eq!(
        outcome.failure(),
        Some(ResolveError::NoUsableResult { probed: 2, faulted: 0 })
    );
    assert!(outcome.diagnostics[0]
        .body_excerpt
        .as_deref()
        .is_some_and(|b| b.contains("daily limit reached")));

    Ok(())
}

#[tokio::test]
async fn test_plain_text_provider() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("https://cdn.example/plain.mp3\n"))
        .mount(&mock)
        .await;

    let service = service(
        vec![],
        vec![resolver(&mock, "text").with_dialect(Dialect::Text)],
        Duration::from_secs(5),
    );

    let outcome = service.resolve(WATCH_URL, None).await?;

    assert!(outcome.success);
    assert_eq!(outcome.results[0].url, "https://cdn.example/plain.mp3");
    assert_eq!(outcome.results[0].title, "Media");

    Ok(())
}

#[tokio::test]
async fn test_media_type_selects_providers() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(&mock, "/ytmp3", 200, json!({"result": {"download_url": "https://cdn.example/a.mp3"}})).await;
    Mock::given(method("GET"))
        .and(path("/ytmp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let service = service(
        vec![],
        vec![
            resolver(&mock, "ytmp3").with_media_type(MediaType::Audio),
            resolver(&mock, "ytmp4").with_media_type(MediaType::Video),
        ],
        Duration::from_secs(5),
    );

    let outcome = service.resolve(WATCH_URL, Some(MediaType::Audio)).await?;

    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.results[0].media_type, Some(MediaType::Audio));

    Ok(())
}

#[tokio::test]
async fn test_invalid_input_issues_no_probes() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let service = service(
        vec![searcher(&mock, "yts")],
        vec![resolver(&mock, "A")],
        Duration::from_secs(5),
    );

    assert!(matches!(
        service.resolve("   ", None).await,
        Err(ResolveError::InvalidInput(_))
    ));
    assert!(matches!(
        service.search("").await,
        Err(ResolveError::InvalidInput(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_empty_search_skips_resolve() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/yts"))
        .and(query_param("query", "no such song xyz123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": true, "results": []})))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/A"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let service = service(
        vec![searcher(&mock, "yts")],
        vec![resolver(&mock, "A")],
        Duration::from_secs(5),
    );

    let results = service.search("no such song xyz123").await?;
    assert!(results.is_empty());

    let err = assert_err!(service.search_and_resolve("no such song xyz123", None).await);
    assert!(matches!(err, ResolveError::UpstreamSearchFailure(_)));

    Ok(())
}

#[tokio::test]
async fn test_search_falls_back_to_next_provider() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/primary"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;
    mount_json(
        &mock,
        "/backup",
        200,
        json!({"results": [
            {"title": "Never Gonna Give You Up", "url": WATCH_URL, "thumbnail": "https://i.ytimg.com/vi/abc123/hqdefault.jpg"},
            {"title": "Second", "videoId": "def456"}
        ]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/unused"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let service = service(
        vec![
            searcher(&mock, "primary"),
            searcher(&mock, "backup"),
            searcher(&mock, "unused"),
        ],
        vec![],
        Duration::from_secs(5),
    );

    let results = service.search("never gonna").await?;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, WATCH_URL);
    assert_eq!(
        results[0].thumbnail.as_deref(),
        Some("https://i.ytimg.com/vi/abc123/hqdefault.jpg")
    );
    assert_eq!(results[1].url, "https://www.youtube.com/watch?v=def456");

    Ok(())
}

#[tokio::test]
async fn test_search_failure_when_no_provider_answers() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(&mock, "/yts", 200, json!({"error": "upstream exploded"})).await;

    let service = service(vec![searcher(&mock, "yts")], vec![], Duration::from_secs(5));

    let err = assert_err!(service.search("anything").await);
    assert!(matches!(err, ResolveError::UpstreamSearchFailure(ref msg) if msg.contains("upstream exploded")));

    Ok(())
}

#[tokio::test]
async fn test_search_then_resolve() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(
        &mock,
        "/yts",
        200,
        json!({"results": [{"title": "Song", "url": "https://youtu.be/abc123"}]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/A"))
        .and(query_param("url", WATCH_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"url": "https://cdn.example/a.mp3", "title": "Song"}})))
        .expect(1)
        .mount(&mock)
        .await;

    let service = service(
        vec![searcher(&mock, "yts")],
        vec![resolver(&mock, "A")],
        Duration::from_secs(5),
    );

    let resolution = service.search_and_resolve("song", None).await?;

    assert_eq!(resolution.video.title, "Song");
    assert!(resolution.outcome.success);
    assert_eq!(resolution.outcome.results[0].source_provider, "A");

    Ok(())
}

#[tokio::test]
async fn test_http_front_end() -> Result<()> {
    let mock = MockServer::start().await;
    mount_json(
        &mock,
        "/ytmp3",
        200,
        json!({"result": {"title": "Song", "download_url": "https://cdn.example/a.mp3"}}),
    )
    .await;

    let service = service(
        vec![searcher(&mock, "yts")],
        vec![resolver(&mock, "ytmp3").with_media_type(MediaType::Audio)],
        Duration::from_secs(5),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(server::serve_on(listener, Arc::new(service)));

    let client = reqwest::Client::new();

    let download: serde_json::Value = client
        .get(format!("http://{}/download?url=abc123&type=audio", addr))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(
        download,
        json!({
            "success": true,
            "downloads": [{"title": "Song", "url": "https://cdn.example/a.mp3", "type": "audio", "source": "ytmp3"}]
        })
    );

    let missing = client.get(format!("http://{}/search", addr)).send().await?;
    assert_eq!(missing.status().as_u16(), 400);
    let body: serde_json::Value = missing.json().await?;
    assert!(body["error"].as_str().is_some_and(|e| e.contains("must not be empty")));

    let bad_type = client
        .get(format!("http://{}/download?url=abc123&type=gif", addr))
        .send()
        .await?;
    assert_eq!(bad_type.status().as_u16(), 400);

    Ok(())
}

#[tokio::test]
async fn test_config_file_round_trip() -> Result<()> {
    use std::io::Write;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("providers.toml");
    let mut file = std::fs::File::create(&path)?;
    writeln!(
        file,
        r#"
probe_timeout_secs = 12
user_agent = "tests/1.0"

[providers]
version = 1

[[providers.resolve]]
name = "only"
url_template = "https://dl.example/get?url={{query}}"
dialect = "flat"
"#
    )?;
    drop(file);

    let config = Config::load(Some(path.as_path()))?;

    assert_eq!(config.probe_timeout(), Duration::from_secs(12));
    assert_eq!(config.user_agent, "tests/1.0");
    assert!(config.registry.search.is_empty());
    assert_eq!(config.registry.resolve[0].dialect, Dialect::Flat);
    assert!(ResolutionService::from_config(&config).is_ok());

    let missing = dir.path().join("missing.toml");
    assert!(Config::load(Some(missing.as_path())).is_err());

    Ok(())
}
