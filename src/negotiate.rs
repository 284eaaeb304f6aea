// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容协商
//!
//! 在 brotli、gzip 与原文件之间选择。只做子串判断：`accept-encoding` 中含有 `br`
//! 且存在 `.br` 变体则选 brotli，否则含有 `gzip` 且存在 `.gz` 变体则选 gzip，
//! 其余情况发送原文件。不解析 q 值，`br;q=0` 同样会选中 brotli。

use std::path::{Path, PathBuf};

use crate::{
    index::{AssetEntry, CompressedVariant},
    param::HttpEncoding,
};

/// 协商结果：实际要发送的文件、它的大小与编码
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    path: PathBuf,
    size: u64,
    encoding: Option<HttpEncoding>,
}

impl Negotiated {
    pub fn identity(entry: &AssetEntry) -> Self {
        Self {
            path: entry.path().to_path_buf(),
            size: entry.size(),
            encoding: None,
        }
    }

    fn compressed(variant: &CompressedVariant, encoding: HttpEncoding) -> Self {
        Self {
            path: variant.path().to_path_buf(),
            size: variant.size(),
            encoding: Some(encoding),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encoding(&self) -> Option<HttpEncoding> {
        self.encoding
    }
}

pub fn negotiate(entry: &AssetEntry, accept_encoding: Option<&str>) -> Negotiated {
    let accept_encoding = accept_encoding.unwrap_or_default();
    if accept_encoding.contains("br") {
        if let Some(variant) = entry.brotli() {
            return Negotiated::compressed(variant, HttpEncoding::Br);
        }
    }
    if accept_encoding.contains("gzip") {
        if let Some(variant) = entry.gzip() {
            return Negotiated::compressed(variant, HttpEncoding::Gzip);
        }
    }
    Negotiated::identity(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn both() -> AssetEntry {
        AssetEntry::new("/srv/www/app.js", 1000, UNIX_EPOCH)
            .with_gzip(300)
            .with_brotli(250)
    }

    #[test]
    fn test_brotli_preferred() {
        let chosen = negotiate(&both(), Some("gzip, deflate, br"));
        assert_eq!(chosen.encoding(), Some(HttpEncoding::Br));
        assert_eq!(chosen.size(), 250);
        assert_eq!(chosen.path(), Path::new("/srv/www/app.js.br"));
    }

    #[test]
    fn test_gzip_when_brotli_not_accepted() {
        let chosen = negotiate(&both(), Some("gzip, deflate"));
        assert_eq!(chosen.encoding(), Some(HttpEncoding::Gzip));
        assert_eq!(chosen.size(), 300);
        assert_eq!(chosen.path(), Path::new("/srv/www/app.js.gz"));
    }

    #[test]
    fn test_gzip_when_no_brotli_variant() {
        let entry = AssetEntry::new("/srv/www/app.js", 1000, UNIX_EPOCH).with_gzip(300);
        let chosen = negotiate(&entry, Some("br, gzip"));
        assert_eq!(chosen.encoding(), Some(HttpEncoding::Gzip));
    }

    #[test]
    fn test_identity_without_header() {
        let chosen = negotiate(&both(), None);
        assert_eq!(chosen, Negotiated::identity(&both()));
        assert_eq!(chosen.encoding(), None);
        assert_eq!(chosen.size(), 1000);
    }

    #[test]
    fn test_identity_without_recognized_token() {
        let chosen = negotiate(&both(), Some("deflate, identity, *"));
        assert_eq!(chosen.encoding(), None);
    }

    #[test]
    fn test_identity_without_variants() {
        let entry = AssetEntry::new("/srv/www/logo.png", 1000, UNIX_EPOCH);
        let chosen = negotiate(&entry, Some("br, gzip"));
        assert_eq!(chosen.encoding(), None);
        assert_eq!(chosen.path(), Path::new("/srv/www/logo.png"));
    }

    /// 只做子串判断，不解析 q 值
    #[test]
    fn test_quality_values_are_not_parsed() {
        let chosen = negotiate(&both(), Some("br;q=0, gzip;q=1.0"));
        assert_eq!(chosen.encoding(), Some(HttpEncoding::Br));
    }
}
