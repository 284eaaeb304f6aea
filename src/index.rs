// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源索引模块
//!
//! 启动时对站点根目录做一次完整遍历，生成请求路径到文件元数据的只读快照。
//!
//! ## 规则
//! - 键是相对根目录的路径，以 `/` 开头、`/` 分隔，大小写敏感。
//! - `.gz` / `.br` 文件不会成为键，只作为同名原文件的预压缩变体被记录。
//! - ETag 由（绝对路径、字节数、修改时间毫秒数）经固定种子的 xxh3 计算，
//!   相同输入在任何进程中都得到相同结果。
//! - 每个子目录、每个文件各自是一个并发任务；所有任务都成功后索引才可用，
//!   任意一个失败则整个构建失败，不会返回部分索引。
//!
//! 快照建立之后不再访问文件系统做检查：启动后删除的文件会在打开时失败，
//! 启动后新增的文件在重启前都不可见。

use std::{
    collections::HashMap,
    ffi::OsString,
    fs::Metadata,
    future::Future,
    io,
    path::{Component, Path, PathBuf},
    pin::Pin,
    sync::Arc,
    time::SystemTime,
};

use log::{debug, info, warn};
use tokio::{fs, task::JoinSet};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::{
    exception::Exception,
    param::{mime_for, BROTLI_SUFFIX, GZIP_SUFFIX},
    util::{epoch_millis, format_file_size, http_date},
};

/// ETag 哈希的固定种子
pub const ETAG_SEED: u64 = 0x736e_6170_7365_7276;

/// 与原文件同目录的预压缩兄弟文件（`F.gz` 或 `F.br`）
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedVariant {
    path: PathBuf,
    size: u64,
}

impl CompressedVariant {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// 一个可服务的原始（未压缩）文件
#[derive(Debug, Clone, PartialEq)]
pub struct AssetEntry {
    path: PathBuf,
    content_type: Option<&'static str>,
    size: u64,
    last_modified: String,
    etag: String,
    gzip: Option<CompressedVariant>,
    brotli: Option<CompressedVariant>,
}

impl AssetEntry {
    /// 由已知元数据构造条目，内容类型按后缀推断。
    pub fn new<P: Into<PathBuf>>(path: P, size: u64, modified: SystemTime) -> Self {
        let path = path.into();
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for);
        let etag = compute_etag(&path, size, epoch_millis(modified));
        Self {
            path,
            content_type,
            size,
            last_modified: http_date(modified),
            etag,
            gzip: None,
            brotli: None,
        }
    }

    /// 记录 `F.gz` 变体
    pub fn with_gzip(mut self, size: u64) -> Self {
        self.gzip = Some(CompressedVariant {
            path: sibling_path(&self.path, GZIP_SUFFIX),
            size,
        });
        self
    }

    /// 记录 `F.br` 变体
    pub fn with_brotli(mut self, size: u64) -> Self {
        self.brotli = Some(CompressedVariant {
            path: sibling_path(&self.path, BROTLI_SUFFIX),
            size,
        });
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn gzip(&self) -> Option<&CompressedVariant> {
        self.gzip.as_ref()
    }

    pub fn brotli(&self) -> Option<&CompressedVariant> {
        self.brotli.as_ref()
    }

    pub fn has_variants(&self) -> bool {
        self.gzip.is_some() || self.brotli.is_some()
    }
}

/// 请求路径 -> 资源条目的不可变快照
#[derive(Debug, Default)]
pub struct AssetIndex {
    entries: HashMap<String, AssetEntry>,
}

impl AssetIndex {
    /// 遍历 `root` 构建索引。任何目录或文件不可读都会使构建失败。
    pub async fn build<P: AsRef<Path>>(root: P) -> Result<Self, Exception> {
        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .await
            .map_err(|e| Exception::io(root, e))?;
        let metadata = fs::metadata(&root)
            .await
            .map_err(|e| Exception::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(Exception::io(
                &root,
                io::Error::new(io::ErrorKind::Other, "site root is not a directory"),
            ));
        }
        info!("开始构建资源索引：{}", root.display());

        let root = Arc::new(root);
        let indexed = walk_dir(Arc::clone(&root), root.to_path_buf()).await?;
        let index = Self::from_entries(indexed);

        let total: u64 = index.entries.values().map(AssetEntry::size).sum();
        let compressed = index
            .entries
            .values()
            .filter(|e| e.has_variants())
            .count();
        info!(
            "资源索引构建完成：{}个文件（{}个带预压缩变体），共{}",
            index.len(),
            compressed,
            format_file_size(total)
        );
        Ok(index)
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, AssetEntry)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, request_path: &str) -> Option<&AssetEntry> {
        self.entries.get(request_path)
    }

    pub fn contains(&self, request_path: &str) -> bool {
        self.entries.contains_key(request_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// 计算 ETag：固定种子 xxh3 的十六进制表示。
pub fn compute_etag(path: &Path, size: u64, modified_millis: u128) -> String {
    let input = format!("{}:{}:{}", path.display(), size, modified_millis);
    format!("{:016x}", xxh3_64_with_seed(input.as_bytes(), ETAG_SEED))
}

type Indexed = Vec<(String, AssetEntry)>;
type IndexFuture = Pin<Box<dyn Future<Output = Result<Indexed, Exception>> + Send>>;

/// 为目录下的每一项派生一个任务，并在返回前等待全部完成。
fn walk_dir(root: Arc<PathBuf>, dir: PathBuf) -> IndexFuture {
    Box::pin(fan_out(root, dir))
}

async fn fan_out(root: Arc<PathBuf>, dir: PathBuf) -> Result<Indexed, Exception> {
    let mut read_dir = fs::read_dir(&dir)
        .await
        .map_err(|e| Exception::io(&dir, e))?;
    let mut tasks = JoinSet::new();
    while let Some(dir_entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| Exception::io(&dir, e))?
    {
        tasks.spawn(index_path(Arc::clone(&root), dir_entry.path()));
    }

    let mut indexed = Vec::new();
    // 提前返回时 JoinSet 被丢弃，其余任务随之中止
    while let Some(joined) = tasks.join_next().await {
        indexed.extend(joined??);
    }
    Ok(indexed)
}

async fn index_path(root: Arc<PathBuf>, path: PathBuf) -> Result<Indexed, Exception> {
    let link_metadata = fs::symlink_metadata(&path)
        .await
        .map_err(|e| Exception::io(&path, e))?;
    let metadata = if link_metadata.file_type().is_symlink() {
        fs::metadata(&path)
            .await
            .map_err(|e| Exception::io(&path, e))?
    } else {
        link_metadata.clone()
    };

    if metadata.is_dir() {
        if link_metadata.file_type().is_symlink() {
            warn!("跳过指向目录的符号链接：{}", path.display());
            return Ok(Vec::new());
        }
        return walk_dir(root, path).await;
    }
    if !metadata.is_file() || is_compressed_sibling(&path) {
        return Ok(Vec::new());
    }

    let key = match request_key(&root, &path) {
        Some(key) => key,
        None => {
            warn!("文件名不是合法的UTF-8，无法通过URL访问，已跳过：{}", path.display());
            return Ok(Vec::new());
        }
    };
    let entry = describe_file(&path, &metadata).await?;
    debug!(
        "索引 {} -> {} ({} bytes, etag {})",
        key,
        path.display(),
        entry.size(),
        entry.etag()
    );
    Ok(vec![(key, entry)])
}

async fn describe_file(path: &Path, metadata: &Metadata) -> Result<AssetEntry, Exception> {
    let modified = metadata.modified().map_err(|e| Exception::io(path, e))?;
    let mut entry = AssetEntry::new(path, metadata.len(), modified);
    entry.gzip = stat_sibling(path, GZIP_SUFFIX).await?;
    entry.brotli = stat_sibling(path, BROTLI_SUFFIX).await?;
    Ok(entry)
}

async fn stat_sibling(path: &Path, suffix: &str) -> Result<Option<CompressedVariant>, Exception> {
    let sibling = sibling_path(path, suffix);
    match fs::metadata(&sibling).await {
        Ok(meta) if meta.is_file() => Ok(Some(CompressedVariant {
            path: sibling,
            size: meta.len(),
        })),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Exception::io(sibling, e)),
    }
}

/// `F` -> `F.<suffix>`，保留原文件的完整文件名
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn is_compressed_sibling(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(GZIP_SUFFIX) | Some(BROTLI_SUFFIX)
    )
}

/// 文件相对根目录的请求路径，例如 `/assets/app.js`
fn request_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                key.push('/');
                key.push_str(part.to_str()?);
            }
            _ => return None,
        }
    }
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
