// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 预压缩静态资源服务器
//!
//! 启动流程：
//! 1. 读取 TOML 配置（默认 `config/development.toml`，可由第一个参数指定）。
//! 2. 按配置初始化 log4rs。
//! 3. 构建资源索引快照，任何读取失败都会中止启动。
//! 4. 监听端口，每个连接一个 Tokio 任务，处理一个请求后关闭。

use std::{
    env,
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{net::TcpListener, runtime::Builder};

use snapserve::{AssetIndex, Config, Exception, Outcome, ServeRecord, StaticServer};

const DEFAULT_CONFIG: &str = "config/development.toml";

fn main() {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("无法载入配置文件{}：{}", config_path, e);
            process::exit(1);
        }
    };

    init_logging(config.log_config());
    info!("配置文件已载入：{}", config_path);
    info!("www root: {}", config.www_root());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("服务器启动失败：{}", e);
        process::exit(1);
    }
}

/// 从 YAML 文件初始化 log4rs；失败时改用 info 级别的控制台输出。
fn init_logging(path: &str) {
    let err = match log4rs::init_file(path, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };
    eprintln!("无法从{}载入日志配置（{}），改用控制台日志", path, err);

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("无法初始化日志系统：{}", e);
            }
        }
        Err(e) => eprintln!("日志配置无效：{}", e),
    }
}

async fn run(config: Config) -> Result<(), Exception> {
    let start_time = Instant::now();
    let index = AssetIndex::build(config.www_root()).await?;
    info!("索引构建用时{}ms", start_time.elapsed().as_millis());

    let options = config.serve_options();
    info!(
        "首页文件：{}，回退路径：{:?}，max-age：{}s",
        options.index_file_name, options.fallback_path, options.max_age_seconds
    );
    let server = Arc::new(StaticServer::new(index, options));

    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, config.port());
    let listener = TcpListener::bind(socket)
        .await
        .map_err(|source| Exception::Bind {
            addr: socket.to_string(),
            source,
        })?;
    info!("服务端将在{}上监听Socket连接", socket);

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("收到停机信号，停止接受新连接");
                break;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let start_time = Instant::now();
            if let Some(record) = server.serve_connection(&mut stream, id).await {
                log_request(&record, start_time.elapsed());
            }
        });
        id += 1;
    }
    Ok(())
}

/// 请求日志：每个请求一行 JSON，包含实际发送的响应头
fn log_request(record: &ServeRecord, elapsed: Duration) {
    match serde_json::to_string(record) {
        Ok(json) => match record.outcome {
            Outcome::StreamError => error!("[ID{}] {}ms {}", record.id, elapsed.as_millis(), json),
            _ => info!("[ID{}] {}ms {}", record.id, elapsed.as_millis(), json),
        },
        Err(e) => warn!("[ID{}]无法序列化请求记录: {}", record.id, e),
    }
}
