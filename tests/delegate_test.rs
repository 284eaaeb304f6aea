//! 委托处理器：只有在索引无匹配（或方法不归静态管线处理）时才会被调用。

use std::fs;

use mockall::{mock, predicate::*};
use tempfile::TempDir;

use snapserve::{
    AssetIndex, HttpRequestMethod, Outcome, Request, Response, ServeOptions, StaticServer,
    UnmatchedHandler,
};

mock! {
    pub Router {}

    impl UnmatchedHandler for Router {
        fn handle(&self, request: &Request) -> Response;
    }
}

async fn build(dir: &TempDir, fallback: Option<&str>, router: MockRouter) -> StaticServer {
    fs::write(dir.path().join("index.html"), "<h1>shell</h1>").unwrap();
    fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
    let index = AssetIndex::build(dir.path()).await.unwrap();
    let options = ServeOptions {
        fallback_path: fallback.map(str::to_string),
        ..ServeOptions::default()
    };
    StaticServer::new(index, options).with_unmatched(router)
}

#[tokio::test]
async fn test_delegate_invoked_on_miss() {
    let dir = TempDir::new().unwrap();
    let mut router = MockRouter::new();
    router
        .expect_handle()
        .withf(|request: &Request| request.path() == "/api/users")
        .times(1)
        .returning(|_| Response::text(200, "[]"));
    let server = build(&dir, None, router).await;

    let mut sink: Vec<u8> = Vec::new();
    let record = server
        .handle(&Request::get("/api/users"), 3, &mut sink)
        .await;

    assert_eq!(record.status, 200);
    assert_eq!(record.outcome, Outcome::Delegated);
    assert_eq!(record.headers.get("content-type"), Some("text/plain;charset=utf-8"));
    assert!(String::from_utf8_lossy(&sink).ends_with("\r\n\r\n[]"));
}

#[tokio::test]
async fn test_delegate_not_invoked_on_hit() {
    let dir = TempDir::new().unwrap();
    let mut router = MockRouter::new();
    router.expect_handle().never();
    let server = build(&dir, None, router).await;

    let mut sink: Vec<u8> = Vec::new();
    let record = server
        .handle(&Request::get("/robots.txt"), 1, &mut sink)
        .await;
    assert_eq!(record.outcome, Outcome::Complete);
    assert!(String::from_utf8_lossy(&sink).ends_with("User-agent: *"));
}

#[tokio::test]
async fn test_fallback_wins_over_delegate() {
    let dir = TempDir::new().unwrap();
    let mut router = MockRouter::new();
    router.expect_handle().never();
    let server = build(&dir, Some("/index.html"), router).await;

    let mut sink: Vec<u8> = Vec::new();
    let record = server
        .handle(&Request::get("/dashboard"), 1, &mut sink)
        .await;
    assert_eq!(record.status, 200);
    assert!(String::from_utf8_lossy(&sink).ends_with("<h1>shell</h1>"));
}

#[tokio::test]
async fn test_delegate_handles_write_methods() {
    let dir = TempDir::new().unwrap();
    let mut router = MockRouter::new();
    router
        .expect_handle()
        .withf(|request: &Request| request.method() == HttpRequestMethod::Post)
        .times(1)
        .returning(|_| Response::text(201, "created"));
    let server = build(&dir, None, router).await;

    let mut sink: Vec<u8> = Vec::new();
    // 即使路径命中静态资源，POST 也交给委托处理器
    let request = Request::new(HttpRequestMethod::Post, "/robots.txt");
    let record = server.handle(&request, 1, &mut sink).await;
    assert_eq!(record.status, 201);
    assert_eq!(record.outcome, Outcome::Delegated);
}

#[tokio::test]
async fn test_delegated_head_has_no_body() {
    let dir = TempDir::new().unwrap();
    let mut router = MockRouter::new();
    router
        .expect_handle()
        .times(1)
        .returning(|_| Response::text(200, "payload"));
    let server = build(&dir, None, router).await;

    let mut sink: Vec<u8> = Vec::new();
    let request = Request::new(HttpRequestMethod::Head, "/api/ping");
    let record = server.handle(&request, 1, &mut sink).await;
    assert_eq!(record.bytes_sent, 0);
    assert_eq!(record.headers.get("content-length"), Some("7"));
    assert!(String::from_utf8_lossy(&sink).ends_with("\r\n\r\n"));
}
