use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use remote_assets::{
    AliasRule, CacheIndexStore, Fetch, FetchError, HttpFetcher, Options, RemoteAssets, ResolveError,
};
use url::Url;

#[derive(Clone, Default)]
struct Hits {
    logo: Arc<AtomicUsize>,
    flaky: Arc<AtomicUsize>,
    broken: Arc<AtomicUsize>,
}

async fn logo(State(hits): State<Hits>) -> impl IntoResponse {
    hits.logo.fetch_add(1, Ordering::SeqCst);
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=120"),
        ],
        "<svg xmlns=\"http://www.w3.org/2000/svg\"/>",
    )
}

async fn plain() -> &'static str {
    "just text"
}

async fn flaky(State(hits): State<Hits>) -> impl IntoResponse {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response()
    } else {
        ([(header::CONTENT_TYPE, "text/css")], "body { color: red }").into_response()
    }
}

async fn broken(State(hits): State<Hits>) -> impl IntoResponse {
    hits.broken.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "gone")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

async fn serve() -> (SocketAddr, Hits) {
    init_tracing();

    let hits = Hits::default();
    let app = Router::new()
        .route("/logo.svg", get(logo))
        .route("/plain", get(plain))
        .route("/flaky.css", get(flaky))
        .route("/broken.png", get(broken))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn engine(cache_dir: &Path) -> RemoteAssets {
    let options = Options::builder()
        .with_cache_location(cache_dir)
        .with_system_proxy(false)
        .build();
    RemoteAssets::new(options).unwrap()
}

#[tokio::test]
async fn fetcher_reports_headers_and_status() {
    let (addr, _) = serve().await;
    let fetcher = HttpFetcher::from_config(&Options::builder().with_system_proxy(false).build().http)
        .unwrap();

    let asset = fetcher
        .fetch(&Url::parse(&format!("http://{addr}/logo.svg")).unwrap())
        .await
        .unwrap();
    assert_eq!(asset.content_type.as_deref(), Some("image/svg+xml"));
    assert_eq!(asset.cache_control.as_deref(), Some("public, max-age=120"));
    assert!(asset.body.starts_with(b"<svg"));

    let err = fetcher
        .fetch(&Url::parse(&format!("http://{addr}/broken.png")).unwrap())
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, reason, .. } => {
            assert_eq!(status, 404);
            assert_eq!(reason, "Not Found");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn resolves_over_http_and_persists() {
    let (addr, hits) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let id = format!("virtual:remote/http://{addr}/logo.svg?theme=dark");

    let engine = engine(dir.path());
    engine.build_start().await;
    let path = engine.resolve_id(&id).await.unwrap().unwrap();
    engine.build_end().await;

    assert!(path.ends_with(".svg?theme=dark"));
    let file = path.trim_end_matches("?theme=dark");
    assert!(std::fs::read_to_string(file).unwrap().starts_with("<svg"));

    let record = engine
        .lookup(&format!("http://{addr}/logo.svg?theme=dark"))
        .unwrap();
    let remaining = record.expires - chrono::Utc::now();
    assert!(remaining.num_seconds() > 110 && remaining.num_seconds() <= 120);

    // A fresh engine picks the record up from index.json without fetching.
    let next_build = self::engine(dir.path());
    next_build.build_start().await;
    let again = next_build.resolve_id(&id).await.unwrap().unwrap();
    assert_eq!(again, path);
    assert_eq!(hits.logo.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn plain_text_gets_txt_extension() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();

    let path = engine(dir.path())
        .resolve_id(&format!("virtual:remote/http://{addr}/plain"))
        .await
        .unwrap()
        .unwrap();

    // axum labels string bodies as text/plain; charset=utf-8.
    assert!(path.ends_with(".txt"));
}

#[tokio::test]
async fn retries_transient_failures() {
    let (addr, hits) = serve().await;
    let dir = tempfile::tempdir().unwrap();

    let path = engine(dir.path())
        .resolve_id(&format!("virtual:remote/http://{addr}/flaky.css"))
        .await
        .unwrap()
        .unwrap();

    assert!(path.ends_with(".css"));
    assert_eq!(hits.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_retry_limit() {
    let (addr, hits) = serve().await;
    let dir = tempfile::tempdir().unwrap();

    let err = engine(dir.path())
        .resolve_id(&format!("virtual:remote/http://{addr}/broken.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::RetryExhausted { attempts: 3, .. }));
    assert_eq!(hits.broken.load(Ordering::SeqCst), 3);
    assert!(err.to_string().contains("failed to resolve after 3 attempts"));
}

#[tokio::test]
async fn aliases_resolve_to_local_server() {
    let (addr, hits) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let options = Options::builder()
        .with_cache_location(dir.path())
        .with_system_proxy(false)
        .with_alias_rule(AliasRule::new("^@local/(.+)$", &format!("http://{addr}/$1")).unwrap())
        .build();
    let engine = RemoteAssets::new(options).unwrap();

    let path = engine
        .resolve_id("virtual:remote/@local/logo.svg")
        .await
        .unwrap()
        .unwrap();
    assert!(path.ends_with(".svg"));
    assert_eq!(hits.logo.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_index_does_not_break_the_build() {
    let (addr, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.json"), "[not, an, index").unwrap();

    let engine = engine(dir.path());
    engine.build_start().await;
    assert!(engine.is_empty());

    engine
        .resolve_id(&format!("virtual:remote/http://{addr}/logo.svg"))
        .await
        .unwrap();
    engine.build_end().await;

    let index = CacheIndexStore::new(dir.path()).try_load().await.unwrap();
    assert_eq!(index.len(), 1);
}
