// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求管线
//!
//! `StaticServer` 持有索引快照与服务选项，按以下顺序处理每个请求：
//!
//! 解析路径 → 内容协商 → 缓存校验 →（304 | 流式发送）
//!
//! 解析不到资源时交给 `UnmatchedHandler`（如果有），否则回复 404。
//! 请求之间除了只读索引外没有共享的可变状态，因此不需要任何锁。
//!
//! `serve_connection` 负责连接层面的工作：读取请求头、解析、处理一个请求后关闭写端。

use std::{io, sync::Arc};

use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    cache::{build_headers, check_conditional},
    config::ServeOptions,
    index::{AssetEntry, AssetIndex},
    negotiate::negotiate,
    param::{HttpRequestMethod, MAX_HEAD_SIZE},
    request::Request,
    resolver::resolve,
    response::{stream_variant, write_response, Outcome, Response, ServeRecord},
};

/// 索引中找不到资源时的委托处理器，例如外层框架的下一个路由。
pub trait UnmatchedHandler: Send + Sync {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> UnmatchedHandler for F
where
    F: Fn(&Request) -> Response + Send + Sync,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

pub struct StaticServer {
    index: AssetIndex,
    options: ServeOptions,
    unmatched: Option<Arc<dyn UnmatchedHandler>>,
}

impl StaticServer {
    pub fn new(index: AssetIndex, options: ServeOptions) -> Self {
        Self {
            index,
            options,
            unmatched: None,
        }
    }

    /// 安装委托处理器。安装后无匹配的请求不再回复 404。
    pub fn with_unmatched<H>(mut self, handler: H) -> Self
    where
        H: UnmatchedHandler + 'static,
    {
        self.unmatched = Some(Arc::new(handler));
        self
    }

    pub fn index(&self) -> &AssetIndex {
        &self.index
    }

    pub fn resolve(&self, request_path: &str) -> Option<&AssetEntry> {
        resolve(
            request_path,
            &self.index,
            &self.options.index_file_name,
            self.options.fallback_path.as_deref(),
        )
    }

    /// 处理一个请求并把响应写入 `sink`，返回实际发送内容的记录。
    pub async fn handle<W>(&self, request: &Request, id: u128, sink: &mut W) -> ServeRecord
    where
        W: AsyncWrite + Unpin,
    {
        let record = ServeRecord::for_request(request, id);
        let head_only = match request.method() {
            HttpRequestMethod::Get => false,
            HttpRequestMethod::Head => true,
            HttpRequestMethod::Options => {
                return write_response(&Response::options(), sink, false, record, Outcome::Complete)
                    .await;
            }
            method => {
                debug!("[ID{}]静态资源管线不处理{}请求", id, method);
                return match &self.unmatched {
                    Some(handler) => self.delegate(handler.as_ref(), request, sink, record).await,
                    None => {
                        write_response(
                            &Response::method_not_allowed(),
                            sink,
                            false,
                            record,
                            Outcome::MethodNotAllowed,
                        )
                        .await
                    }
                };
            }
        };

        let entry = match self.resolve(request.path()) {
            Some(entry) => entry,
            None => {
                debug!("[ID{}]{}在索引中无匹配", id, request.path());
                return match &self.unmatched {
                    Some(handler) => self.delegate(handler.as_ref(), request, sink, record).await,
                    None => {
                        write_response(
                            &Response::not_found(),
                            sink,
                            head_only,
                            record,
                            Outcome::NotFound,
                        )
                        .await
                    }
                };
            }
        };
        debug!("[ID{}]{} -> {}", id, request.path(), entry.path().display());

        let variant = negotiate(entry, request.accept_encoding());
        debug!("[ID{}]协商结果: {:?}", id, variant.encoding());

        let headers = build_headers(entry, self.options.max_age_seconds);
        if check_conditional(request.if_none_match(), entry) {
            debug!("[ID{}]ETag命中，返回304", id);
            return write_response(
                &Response::not_modified(headers),
                sink,
                true,
                record,
                Outcome::NotModified,
            )
            .await;
        }

        stream_variant(
            &variant,
            headers,
            head_only,
            self.options.chunk_size,
            sink,
            record,
        )
        .await
    }

    /// 处理一个连接：读取请求头并交给 `handle`，之后关闭写端。
    ///
    /// 请求头超过上限回复 431，无法解析回复 400。
    /// 客户端没有发送任何数据就关闭连接，或读取失败时返回 `None`。
    pub async fn serve_connection<S>(&self, stream: &mut S, id: u128) -> Option<ServeRecord>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = match read_head(stream).await {
            Ok(RequestHead::Complete(head)) => head,
            Ok(RequestHead::Closed) => {
                debug!("[ID{}]客户端未发送请求即关闭连接", id);
                return None;
            }
            Ok(RequestHead::TooLarge) => {
                warn!("[ID{}]请求头超过{}字节，返回431", id, MAX_HEAD_SIZE);
                let record = write_response(
                    &Response::text(431, "Request Header Fields Too Large"),
                    stream,
                    false,
                    ServeRecord::unparsed(id),
                    Outcome::BadRequest,
                )
                .await;
                close(stream, id).await;
                return Some(record);
            }
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return None;
            }
        };

        let record = match Request::try_from(&head, id) {
            Ok(request) => self.handle(&request, id, stream).await,
            Err(e) => {
                let (response, outcome) = if e.is_bad_request() {
                    warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
                    (Response::bad_request(), Outcome::BadRequest)
                } else {
                    error!("[ID{}]处理请求头时出错: {}，返回500", id, e);
                    (Response::internal_error(), Outcome::StreamError)
                };
                write_response(&response, stream, false, ServeRecord::unparsed(id), outcome).await
            }
        };
        close(stream, id).await;
        Some(record)
    }

    async fn delegate<W>(
        &self,
        handler: &dyn UnmatchedHandler,
        request: &Request,
        sink: &mut W,
        record: ServeRecord,
    ) -> ServeRecord
    where
        W: AsyncWrite + Unpin,
    {
        debug!("[ID{}]交给委托处理器", record.id);
        let response = handler.handle(request);
        let head_only = request.method() == HttpRequestMethod::Head;
        write_response(&response, sink, head_only, record, Outcome::Delegated).await
    }
}

enum RequestHead {
    Complete(Vec<u8>),
    TooLarge,
    Closed,
}

/// 读取直到请求头结束（`\r\n\r\n`）或达到上限
async fn read_head<R>(stream: &mut R) -> io::Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(match buffer.is_empty() {
                true => RequestHead::Closed,
                false => RequestHead::Complete(buffer),
            });
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(RequestHead::Complete(buffer));
        }
        if buffer.len() >= MAX_HEAD_SIZE {
            return Ok(RequestHead::TooLarge);
        }
    }
}

async fn close<W>(stream: &mut W, id: u128)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭连接失败: {}", id, e);
    }
}
