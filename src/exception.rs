// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 服务器在启动（配置加载、索引构建）与请求处理两个阶段可能遇到的错误。
//!
//! - 启动阶段的错误一律是致命的：索引不允许只构建一部分。
//! - 请求解析阶段的错误由上层转换为 `400 Bad Request`。

use std::{io, path::PathBuf};

/// 服务器处理过程中发生的异常类型。
#[derive(Debug, thiserror::Error)]
pub enum Exception {
    /// 请求字节流不是合法的 UTF-8。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,

    /// 请求行格式不正确（缺少方法、目标或版本）。
    #[error("Malformed request line: {0}")]
    MalformedRequest(String),

    /// 不认识的 HTTP 方法。
    #[error("Unsupported request method: {0}")]
    UnSupportedRequestMethod(String),

    /// 不支持的 HTTP 协议版本（只接受 HTTP/1.0 与 HTTP/1.1）。
    #[error("Unsupported HTTP version: {0}")]
    UnsupportedHttpVersion(String),

    /// 请求路径无法解码，或者不是以 `/` 开头。
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// 读取文件系统失败，附带出错的路径。
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 监听地址无法绑定。
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 索引构建的子任务 panic 或被取消。
    #[error("Index task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// 配置文件无法解析或取值非法。
    #[error("Config error: {0}")]
    Config(String),
}

impl Exception {
    /// 构造一个携带路径上下文的 I/O 错误。
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// 是否属于客户端请求本身的问题（应当回复 400）。
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::RequestIsNotUtf8
                | Self::MalformedRequest(_)
                | Self::UnSupportedRequestMethod(_)
                | Self::UnsupportedHttpVersion(_)
                | Self::InvalidPath(_)
        )
    }
}
