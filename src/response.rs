// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应构建与流式发送
//!
//! - `Response`：状态行、响应头与（可选的）内存响应体，用于 404、304、委托处理器等小响应。
//! - `stream_variant`：先写出状态行与全部响应头，再按块把协商选中的文件写入连接。
//! - `ServeRecord`：每个请求最终实际发送的状态码与响应头，交给请求日志读取。

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, error, warn};
use serde_derive::Serialize;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use crate::{
    header::HeaderSet,
    negotiate::Negotiated,
    param::*,
    request::Request,
    util::format_date,
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    date: DateTime<Utc>,
    headers: HeaderSet,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            date: Utc::now(),
            headers: HeaderSet::new(),
            content: None,
        }
    }

    /// 带纯文本响应体的响应
    pub fn text(code: u16, body: &str) -> Self {
        let mut response = Self::new();
        response
            .set_code(code)
            .set_content(TEXT_PLAIN, Bytes::from(body.to_string()));
        response
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn bad_request() -> Self {
        Self::text(400, "Bad Request")
    }

    pub fn internal_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    pub fn method_not_allowed() -> Self {
        let mut response = Self::text(405, "Method Not Allowed");
        response.set_header(header::ALLOW, allow_header_value());
        response
    }

    /// `OPTIONS` 的回复
    pub fn options() -> Self {
        let mut response = Self::new();
        response
            .set_code(204)
            .set_header(header::ALLOW, allow_header_value());
        response
    }

    /// 304：沿用缓存头，不带响应体，也不带 `content-length`
    pub fn not_modified(headers: HeaderSet) -> Self {
        let mut response = Self::new();
        response.set_code(304);
        response.headers = headers;
        response
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                warn!("未收录的状态码：{}", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_header<V: Into<String>>(&mut self, name: &str, value: V) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// 设置内存响应体，同时写入 `content-type` 与 `content-length`
    pub fn set_content(&mut self, content_type: &str, content: Bytes) -> &mut Self {
        self.headers
            .insert(header::CONTENT_TYPE, content_type)
            .insert(header::CONTENT_LENGTH, content.len().to_string());
        self.content = Some(content);
        self
    }

    /// 实际写到连接上的全部响应头（附加 `date`、`server`、`connection`）
    pub fn sent_headers(&self) -> HeaderSet {
        let mut headers = self.headers.clone();
        headers
            .insert(header::DATE, format_date(&self.date))
            .insert(header::SERVER, SERVER_NAME)
            .insert(header::CONNECTION, "close");
        headers
    }

    /// 状态行与响应头，以空行结束
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        for (name, value) in self.sent_headers().iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str(CRLF);
        }
        head.push_str(CRLF);
        head.into_bytes()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = self.head_bytes();
        if let Some(content) = &self.content {
            bytes.extend_from_slice(content);
        }
        bytes
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

/// 请求的最终结局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// 响应完整发送
    Complete,
    /// ETag 命中，304
    NotModified,
    /// 无匹配且没有委托处理器，404
    NotFound,
    /// 无匹配，交给委托处理器
    Delegated,
    /// 打开或读取文件失败、连接写入失败
    StreamError,
    MethodNotAllowed,
    BadRequest,
}

/// 一个请求实际发送了什么，供请求日志使用
#[derive(Debug, Clone, Serialize)]
pub struct ServeRecord {
    pub id: u128,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    pub status: u16,
    pub headers: HeaderSet,
    pub bytes_sent: u64,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl ServeRecord {
    pub fn for_request(request: &Request, id: u128) -> Self {
        Self {
            id,
            method: request.method().to_string(),
            path: request.path().to_string(),
            user_agent: request.user_agent().to_string(),
            status: 0,
            headers: HeaderSet::new(),
            bytes_sent: 0,
            outcome: Outcome::Complete,
            error: None,
        }
    }

    /// 请求头无法解析时没有 `Request` 可用
    pub fn unparsed(id: u128) -> Self {
        Self {
            id,
            method: String::new(),
            path: String::new(),
            user_agent: String::new(),
            status: 0,
            headers: HeaderSet::new(),
            bytes_sent: 0,
            outcome: Outcome::BadRequest,
            error: None,
        }
    }

    fn fail(mut self, outcome: Outcome, error: String) -> Self {
        self.outcome = outcome;
        self.error = Some(error);
        self
    }
}

/// 一次性写出内存中的响应。`head_only` 时省略响应体。
pub async fn write_response<W>(
    response: &Response,
    sink: &mut W,
    head_only: bool,
    mut record: ServeRecord,
    outcome: Outcome,
) -> ServeRecord
where
    W: AsyncWrite + Unpin,
{
    record.status = response.status_code();
    record.headers = response.sent_headers();
    record.outcome = outcome;

    let body = match response.content() {
        Some(content) if !head_only => content.clone(),
        _ => Bytes::new(),
    };
    let mut bytes = response.head_bytes();
    bytes.extend_from_slice(&body);
    match write_all_and_flush(sink, &bytes).await {
        Ok(()) => {
            record.bytes_sent = body.len() as u64;
            record
        }
        Err(e) => {
            warn!("[ID{}]发送{}响应失败: {}", record.id, record.status, e);
            record.fail(Outcome::StreamError, e.to_string())
        }
    }
}

/// 流式发送协商选中的文件。
///
/// 打开失败时尚未写出任何字节，回复 500；响应头写出之后的读取失败只能中止响应。
/// 发送的字节数不会超过快照记录的大小。
pub async fn stream_variant<W>(
    variant: &Negotiated,
    headers: HeaderSet,
    head_only: bool,
    chunk_size: usize,
    sink: &mut W,
    mut record: ServeRecord,
) -> ServeRecord
where
    W: AsyncWrite + Unpin,
{
    let id = record.id;
    // HEAD 也要打开文件，状态码与 GET 一致
    let file = match File::open(variant.path()).await {
        Ok(file) => file,
        Err(e) => {
            error!(
                "[ID{}]无法打开{}：{}（索引快照之后文件可能已被删除）",
                id,
                variant.path().display(),
                e
            );
            let record = write_response(
                &Response::internal_error(),
                sink,
                head_only,
                record,
                Outcome::StreamError,
            )
            .await;
            return record.fail(Outcome::StreamError, e.to_string());
        }
    };

    let mut response = Response::new();
    response.headers = headers;
    response.set_header(header::CONTENT_LENGTH, variant.size().to_string());
    if let Some(encoding) = variant.encoding() {
        response.set_header(header::CONTENT_ENCODING, encoding.to_string());
    }
    record.status = response.status_code();
    record.headers = response.sent_headers();

    if let Err(e) = sink.write_all(&response.head_bytes()).await {
        warn!("[ID{}]发送响应头失败: {}", id, e);
        return record.fail(Outcome::StreamError, e.to_string());
    }

    if head_only {
        if let Err(e) = sink.flush().await {
            return record.fail(Outcome::StreamError, e.to_string());
        }
        record.outcome = Outcome::Complete;
        return record;
    }

    debug!(
        "[ID{}]开始流式传输 {}，大小: {} bytes，编码: {:?}",
        id,
        variant.path().display(),
        variant.size(),
        variant.encoding()
    );
    let mut reader = file.take(variant.size());
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write_all(&buffer[..n]).await {
                    warn!("[ID{}]流式写入失败: {}", id, e);
                    return record.fail(Outcome::StreamError, e.to_string());
                }
                record.bytes_sent += n as u64;
            }
            Err(e) => {
                error!(
                    "[ID{}]读取{}失败，响应已中止: {}",
                    id,
                    variant.path().display(),
                    e
                );
                return record.fail(Outcome::StreamError, e.to_string());
            }
        }
    }

    if record.bytes_sent < variant.size() {
        let message = format!(
            "{} is shorter than its indexed size ({} < {})",
            variant.path().display(),
            record.bytes_sent,
            variant.size()
        );
        error!("[ID{}]{}，响应已中止", id, message);
        return record.fail(Outcome::StreamError, message);
    }
    if let Err(e) = sink.flush().await {
        warn!("[ID{}]刷新连接失败: {}", id, e);
        return record.fail(Outcome::StreamError, e.to_string());
    }
    debug!("[ID{}]流式传输完成，共发送 {} 字节", id, record.bytes_sent);
    record.outcome = Outcome::Complete;
    record
}

async fn write_all_and_flush<W>(sink: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(bytes).await?;
    sink.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::AssetEntry;
    use crate::negotiate::negotiate;
    use std::time::UNIX_EPOCH;

    fn record() -> ServeRecord {
        ServeRecord::for_request(&Request::get("/test"), 7)
    }

    fn split_head(bytes: &[u8]) -> (String, Vec<u8>) {
        let text = String::from_utf8_lossy(bytes).to_string();
        let end = text.find("\r\n\r\n").expect("head terminator") + 4;
        (text[..end].to_string(), bytes[end..].to_vec())
    }

    #[test]
    fn test_response_new() {
        let response = Response::new();

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.information(), "OK");
        assert!(response.content().is_none());
    }

    #[test]
    fn test_response_as_bytes_basic() {
        let bytes = Response::new().as_bytes();
        let response_str = String::from_utf8_lossy(&bytes);

        assert!(response_str.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response_str.contains("server: snapserve\r\n"));
        assert!(response_str.contains("connection: close\r\n"));
        assert!(response_str.contains("date: "));
        assert!(response_str.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_not_found_is_plain_text() {
        let response = Response::not_found();
        let bytes = response.as_bytes();
        let response_str = String::from_utf8_lossy(&bytes);

        assert!(response_str.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response_str.contains("content-type: text/plain;charset=utf-8\r\n"));
        assert!(response_str.contains("content-length: 9\r\n"));
        assert!(response_str.ends_with("\r\n\r\nNot Found"));
    }

    #[test]
    fn test_not_modified_has_no_body() {
        let mut headers = HeaderSet::new();
        headers.insert("etag", "abc");
        let response = Response::not_modified(headers);
        let response_str = String::from_utf8_lossy(&response.as_bytes()).to_string();

        assert!(response_str.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(response_str.contains("etag: abc\r\n"));
        assert!(!response_str.contains("content-length"));
        assert!(response_str.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_method_not_allowed_has_allow() {
        let response = Response::method_not_allowed();
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.headers().get("allow"), Some("GET, HEAD, OPTIONS"));
    }

    #[test]
    fn test_status_code_setter() {
        for (code, expected_info) in [
            (200, "OK"),
            (204, "No Content"),
            (304, "Not Modified"),
            (404, "Not Found"),
            (500, "Internal Server Error"),
            (799, "Unknown"),
        ] {
            let mut response = Response::new();
            response.set_code(code);
            assert_eq!(response.status_code(), code);
            assert_eq!(response.information(), expected_info);
        }
    }

    #[test]
    fn test_record_serializes_to_json() {
        let mut record = record();
        record.status = 304;
        record.outcome = Outcome::NotModified;
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"outcome\":\"not_modified\""));
        assert!(json.contains("\"status\":304"));
        assert!(json.contains("\"path\":\"/test\""));
    }

    #[tokio::test]
    async fn test_write_response_head_only() {
        let mut sink: Vec<u8> = Vec::new();
        let record = write_response(
            &Response::not_found(),
            &mut sink,
            true,
            record(),
            Outcome::NotFound,
        )
        .await;

        let (head, body) = split_head(&sink);
        assert!(head.contains("content-length: 9"));
        assert!(body.is_empty());
        assert_eq!(record.bytes_sent, 0);
        assert_eq!(record.status, 404);
        assert_eq!(record.outcome, Outcome::NotFound);
    }

    #[tokio::test]
    async fn test_stream_identity_in_small_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let content = b"0123456789abcdefghij".repeat(10);
        std::fs::write(&path, &content).unwrap();
        let entry = AssetEntry::new(&path, content.len() as u64, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), false, 7, &mut sink, record()).await;

        let (head, body) = split_head(&sink);
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("content-length: 200\r\n"));
        assert!(!head.contains("content-encoding"));
        assert_eq!(body, content);
        assert_eq!(record.outcome, Outcome::Complete);
        assert_eq!(record.bytes_sent, 200);
        assert_eq!(record.headers.get("content-length"), Some("200"));
    }

    #[tokio::test]
    async fn test_stream_sets_content_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.js");
        std::fs::write(&path, b"original").unwrap();
        std::fs::write(dir.path().join("app.js.br"), b"brotli").unwrap();
        let entry = AssetEntry::new(&path, 8, UNIX_EPOCH).with_brotli(6);
        let variant = negotiate(&entry, Some("br"));

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), false, 1024, &mut sink, record()).await;

        let (head, body) = split_head(&sink);
        assert!(head.contains("content-encoding: br\r\n"));
        assert!(head.contains("content-length: 6\r\n"));
        assert_eq!(body, b"brotli");
        assert_eq!(record.headers.get("content-encoding"), Some("br"));
    }

    #[tokio::test]
    async fn test_stream_missing_file_is_500() {
        let entry = AssetEntry::new("/definitely/not/here.txt", 5, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), false, 1024, &mut sink, record()).await;

        assert_eq!(record.status, 500);
        assert_eq!(record.outcome, Outcome::StreamError);
        assert!(record.error.is_some());
        assert!(String::from_utf8_lossy(&sink).starts_with("HTTP/1.1 500"));
    }

    #[tokio::test]
    async fn test_stream_truncated_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, b"abc").unwrap();
        let entry = AssetEntry::new(&path, 10, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), false, 1024, &mut sink, record()).await;

        assert_eq!(record.status, 200);
        assert_eq!(record.outcome, Outcome::StreamError);
        assert_eq!(record.bytes_sent, 3);
    }

    #[tokio::test]
    async fn test_stream_never_exceeds_indexed_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grown.txt");
        std::fs::write(&path, b"abcdefghij").unwrap();
        let entry = AssetEntry::new(&path, 4, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), false, 1024, &mut sink, record()).await;

        let (_, body) = split_head(&sink);
        assert_eq!(body, b"abcd");
        assert_eq!(record.outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn test_stream_head_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head.txt");
        std::fs::write(&path, b"12345").unwrap();
        let entry = AssetEntry::new(&path, 5, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), true, 1024, &mut sink, record()).await;

        let (head, body) = split_head(&sink);
        assert!(head.contains("content-length: 5"));
        assert!(body.is_empty());
        assert_eq!(record.outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn test_stream_head_missing_file_is_500() {
        let entry = AssetEntry::new("/definitely/not/here.txt", 5, UNIX_EPOCH);
        let variant = negotiate(&entry, None);

        let mut sink: Vec<u8> = Vec::new();
        let record = stream_variant(&variant, HeaderSet::new(), true, 1024, &mut sink, record()).await;

        let (head, body) = split_head(&sink);
        assert!(head.starts_with("HTTP/1.1 500"));
        assert!(body.is_empty());
        assert_eq!(record.status, 500);
        assert_eq!(record.outcome, Outcome::StreamError);
        assert_eq!(record.bytes_sent, 0);
    }

    /// 对端已关闭的连接
    struct BrokenSink;

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_marks_stream_error() {
        let record = write_response(
            &Response::not_found(),
            &mut BrokenSink,
            false,
            record(),
            Outcome::NotFound,
        )
        .await;

        assert_eq!(record.status, 404);
        assert_eq!(record.outcome, Outcome::StreamError);
        assert_eq!(record.bytes_sent, 0);
        assert!(record.error.is_some());
    }
}
