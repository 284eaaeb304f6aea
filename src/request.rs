// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 把从 TCP 流读取的请求头字节解析为 `Request`：
//! 1. 请求行（方法、目标、版本）。目标中的查询串被丢弃，路径经过百分号解码。
//! 2. 所有请求头，名称统一转为小写，因此查找大小写不敏感。
//!
//! 静态资源管线只关心 `accept-encoding` 与 `if-none-match`，其它头部留给日志与委托处理器。

use std::collections::HashMap;

use log::error;
use percent_encoding::percent_decode_str;

use crate::{exception::Exception, param::*};

/// 一个 HTTP 请求的元数据（不含请求体）。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 解码后的路径，不含查询串
    path: String,
    version: HttpVersion,
    /// 小写名称 -> 原始值
    headers: HashMap<String, String>,
}

impl Request {
    /// 以编程方式构造请求，供嵌入方与测试使用。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            version: HttpVersion::V1_1,
            headers: HashMap::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpRequestMethod::Get, path)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.trim().to_string());
        self
    }

    /// 从原始请求头字节构建 `Request`。
    ///
    /// # 参数
    /// * `buffer` - 从 Socket 读取的数据，至少包含完整的请求行。
    /// * `id` - 请求 ID，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };
        // 只解析请求头部分
        let head = match request_string.split_once("\r\n\r\n") {
            Some((head, _body)) => head,
            None => request_string,
        };
        let mut request_lines = head.split(CRLF);

        // 请求行，例如 "GET /index.html HTTP/1.1"
        let first_line = request_lines.next().unwrap_or_default();
        let first_line_parts: Vec<&str> = first_line.split_whitespace().collect();
        if first_line_parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest(first_line.to_string()));
        }

        let method = match HttpRequestMethod::parse(first_line_parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
                return Err(Exception::UnSupportedRequestMethod(
                    first_line_parts[0].to_string(),
                ));
            }
        };

        let version = match HttpVersion::parse(first_line_parts[2]) {
            Some(v) => v,
            None => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, first_line_parts[2]);
                return Err(Exception::UnsupportedHttpVersion(
                    first_line_parts[2].to_string(),
                ));
            }
        };

        let path = decode_target(first_line_parts[1], method)?;

        let mut headers = HashMap::new();
        for line in request_lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            method,
            path,
            version,
            headers,
        })
    }
}

/// 去掉查询串与片段，并对路径做百分号解码。
fn decode_target(target: &str, method: HttpRequestMethod) -> Result<String, Exception> {
    if target == "*" && method == HttpRequestMethod::Options {
        return Ok(target.to_string());
    }
    let raw = target.split(['?', '#']).next().unwrap_or_default();
    if !raw.starts_with('/') {
        return Err(Exception::InvalidPath(target.to_string()));
    }
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) if !decoded.contains('\0') => Ok(decoded.into_owned()),
        _ => Err(Exception::InvalidPath(target.to_string())),
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 解码后的请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 按名称（大小写不敏感）读取请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn accept_encoding(&self) -> Option<&str> {
        self.header(header::ACCEPT_ENCODING)
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.header(header::IF_NONE_MATCH)
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT).unwrap_or_default()
    }
}
