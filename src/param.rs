// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! - 服务器实际会用到的状态码及原因短语。
//! - 静态资源常见后缀到 MIME 类型的映射。
//! - HTTP 方法、版本与内容编码的强类型枚举。
//! - 响应头名称（统一使用小写）。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// 服务器名称标识，用于 `server` 响应头
pub const SERVER_NAME: &str = "snapserve";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 默认首页文件名
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// 默认 `max-age`：14 天
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 1_209_600;

/// 流式发送时每次读取的块大小：256KB
pub const DEFAULT_CHUNK_SIZE: usize = 262_144;

/// 请求头的最大长度，超过则回复 431
pub const MAX_HEAD_SIZE: usize = 8192;

/// 预压缩兄弟文件的后缀，这些文件永远不会成为索引键
pub const GZIP_SUFFIX: &str = "gz";
pub const BROTLI_SUFFIX: &str = "br";

/// 纯文本错误响应使用的类型
pub const TEXT_PLAIN: &str = "text/plain;charset=utf-8";

pub mod header {
    pub const ALLOW: &str = "allow";
    pub const CACHE_CONTROL: &str = "cache-control";
    pub const CONNECTION: &str = "connection";
    pub const CONTENT_ENCODING: &str = "content-encoding";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const DATE: &str = "date";
    pub const ETAG: &str = "etag";
    pub const LAST_MODIFIED: &str = "last-modified";
    pub const SERVER: &str = "server";
    pub const VARY: &str = "vary";

    pub const ACCEPT_ENCODING: &str = "accept-encoding";
    pub const IF_NONE_MATCH: &str = "if-none-match";
    pub const USER_AGENT: &str = "user-agent";
}

lazy_static! {
    /// 静态资源管线直接处理的方法，用于 `allow` 响应头。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
        ]
    };
}

lazy_static! {
    /// 状态码与原因短语。只收录服务器与常见委托处理器会产生的状态码，未收录的状态码使用 `Unknown`。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(431, "Request Header Fields Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀到 `content-type` 的映射。找不到的后缀不发送 `content-type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        // 文档与脚本
        map.insert("html", "text/html;charset=utf-8");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("css", "text/css;charset=utf-8");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("mjs", "text/javascript;charset=utf-8");
        map.insert("map", "application/json");
        map.insert("json", "application/json");
        map.insert("jsonld", "application/ld+json");
        map.insert("webmanifest", "application/manifest+json");
        map.insert("xml", "text/xml");
        map.insert("txt", "text/plain;charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("md", "text/markdown;charset=utf-8");
        map.insert("wasm", "application/wasm");
        map.insert("pdf", "application/pdf");
        // 图片
        map.insert("avif", "image/avif");
        map.insert("bmp", "image/bmp");
        map.insert("gif", "image/gif");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("webp", "image/webp");
        // 字体
        map.insert("otf", "font/otf");
        map.insert("ttf", "font/ttf");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("eot", "application/vnd.ms-fontobject");
        // 音视频
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("ogg", "audio/ogg");
        map.insert("wav", "audio/wav");
        map.insert("webm", "video/webm");
        // 归档
        map.insert("zip", "application/zip");
        map.insert("tar", "application/x-tar");
        map
    };
}

/// 根据后缀查找 MIME 类型。大小写不敏感。
pub fn mime_for(extension: &str) -> Option<&'static str> {
    if let Some(mime) = MIME_TYPES.get(extension) {
        return Some(*mime);
    }
    MIME_TYPES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
    Patch,
}

/// 预压缩变体对应的内容编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpEncoding {
    /// GNU zip
    Gzip,
    /// Brotli
    Br,
}

impl HttpRequestMethod {
    pub fn parse(token: &str) -> Option<Self> {
        let method = match token.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            _ => return None,
        };
        Some(method)
    }
}

impl HttpVersion {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "HTTP/1.0" => Some(Self::V1_0),
            "HTTP/1.1" => Some(Self::V1_1),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 格式化为状态行中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Delete => "DELETE",
            HttpRequestMethod::Patch => "PATCH",
        };
        f.write_str(name)
    }
}

impl fmt::Display for HttpEncoding {
    /// 格式化为 `content-encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

/// `allow` 头的值，例如 `GET, HEAD, OPTIONS`
pub fn allow_header_value() -> String {
    ALLOWED_METHODS
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
