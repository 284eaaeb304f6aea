// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析
//!
//! 把请求路径映射到索引条目。纯函数，不访问文件系统。依次尝试：
//! 1. `/` 替换为 `/<index_file_name>`；
//! 2. 原样查找；
//! 3. 视为目录，追加 `/<index_file_name>`；
//! 4. 配置了回退路径（SPA 外壳）时查找回退路径；
//! 5. 都失败则无匹配。

use crate::index::{AssetEntry, AssetIndex};

pub fn resolve<'a>(
    request_path: &str,
    index: &'a AssetIndex,
    index_file_name: &str,
    fallback_path: Option<&str>,
) -> Option<&'a AssetEntry> {
    if request_path == "/" {
        if let Some(entry) = index.get(&format!("/{}", index_file_name)) {
            return Some(entry);
        }
    } else {
        if let Some(entry) = index.get(request_path) {
            return Some(entry);
        }
        let directory_index = if request_path.ends_with('/') {
            format!("{}{}", request_path, index_file_name)
        } else {
            format!("{}/{}", request_path, index_file_name)
        };
        if let Some(entry) = index.get(&directory_index) {
            return Some(entry);
        }
    }
    fallback_path.and_then(|fallback| index.get(fallback))
}
