use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::warn;
use std::fs;

use crate::exception::Exception;
use crate::param::{DEFAULT_CHUNK_SIZE, DEFAULT_INDEX_FILE, DEFAULT_MAX_AGE_SECONDS};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default = "default_index_file_name")]
    index_file_name: String,
    #[serde(default)]
    fallback_path: Option<String>,
    #[serde(default = "default_max_age_seconds")]
    max_age_seconds: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_log_config")]
    log_config: String,
}

/// 每个请求管线共享的只读选项
#[derive(Debug, Clone, PartialEq)]
pub struct ServeOptions {
    pub index_file_name: String,
    pub fallback_path: Option<String>,
    pub max_age_seconds: u64,
    pub chunk_size: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            index_file_name: default_index_file_name(),
            fallback_path: None,
            max_age_seconds: default_max_age_seconds(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_local() -> bool {
    true
}

fn default_index_file_name() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_max_age_seconds() -> u64 {
    DEFAULT_MAX_AGE_SECONDS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_log_config() -> String {
    "config/log4rs.yaml".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: ".".to_string(),
            port: 7878,
            worker_threads: 0,
            local: default_local(),
            index_file_name: default_index_file_name(),
            fallback_path: None,
            max_age_seconds: default_max_age_seconds(),
            chunk_size: default_chunk_size(),
            log_config: default_log_config(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let str_val = fs::read_to_string(filename).map_err(|e| Exception::io(filename, e))?;
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(str_val: &str) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(str_val).map_err(|e| Exception::config(e.to_string()))?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        raw_config.validate()?;
        Ok(raw_config)
    }

    fn validate(&mut self) -> Result<(), Exception> {
        if self.chunk_size == 0 {
            return Err(Exception::config("chunk_size must be greater than 0"));
        }
        if self.index_file_name.is_empty() || self.index_file_name.contains('/') {
            return Err(Exception::config(format!(
                "index_file_name must be a bare file name, got {:?}",
                self.index_file_name
            )));
        }
        match self.fallback_path.as_deref() {
            Some("") => {
                warn!("fallback_path为空字符串，视为未配置");
                self.fallback_path = None;
            }
            Some(p) if !p.starts_with('/') => {
                return Err(Exception::config(format!(
                    "fallback_path must start with '/', got {:?}",
                    p
                )));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            index_file_name: self.index_file_name.clone(),
            fallback_path: self.fallback_path.clone(),
            max_age_seconds: self.max_age_seconds,
            chunk_size: self.chunk_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn log_config(&self) -> &str {
        &self.log_config
    }
}
