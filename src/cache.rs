// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 缓存校验
//!
//! 生成缓存相关响应头，并处理 `if-none-match` 条件请求。
//!
//! `cache-control` 同时带 `no-cache` 与 `max-age`：`max-age` 只约束中间缓存，
//! 浏览器每次加载都会带着 ETag 回源校验。ETag 以不加引号的十六进制发送，
//! 条件请求按原始字符串完全相等判断，不处理 `W/` 前缀与逗号分隔的列表。

use crate::{header::HeaderSet, index::AssetEntry, param::header};

/// 生成资源条目的缓存头：`last-modified`、`etag`、`cache-control`，
/// 已知类型时还有 `content-type`，存在预压缩变体时还有 `vary`。
pub fn build_headers(entry: &AssetEntry, max_age_seconds: u64) -> HeaderSet {
    let mut headers = HeaderSet::new();
    if let Some(content_type) = entry.content_type() {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers
        .insert(header::LAST_MODIFIED, entry.last_modified())
        .insert(header::ETAG, entry.etag())
        .insert(
            header::CACHE_CONTROL,
            format!("no-cache, must-revalidate, max-age={}", max_age_seconds),
        );
    if entry.has_variants() {
        headers.insert(header::VARY, "accept-encoding");
    }
    headers
}

/// 条件请求是否命中（命中则回复 304）
pub fn check_conditional(if_none_match: Option<&str>, entry: &AssetEntry) -> bool {
    if_none_match == Some(entry.etag())
}
