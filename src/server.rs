// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 传输层
//!
//! 基于 Tokio 的监听循环：每个 TCP 连接一个任务，读取一个请求、交给引擎调度、
//! 写回响应后关闭连接。引擎的处理函数是同步的，因此在 `spawn_blocking` 中执行，
//! 避免阻塞型处理函数拖慢事件循环。读写超时由本模块负责，引擎内部没有超时。

use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};

use crate::{
    engine::Engine,
    exception::Exception,
    param::MAX_HEADER_SIZE,
    request::{header_end, Request},
    response::Response,
};

impl Engine {
    /// 绑定配置中的端口并开始服务，直到收到 Ctrl-C。
    ///
    /// 绑定失败时返回 [`Exception::Bind`]。
    pub async fn run(self) -> Result<(), Exception> {
        let address = match self.config().local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let socket = SocketAddrV4::new(address, self.config().port());
        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定地址：{}，错误：{}", socket, e);
                return Err(Exception::Bind(format!("{}: {}", socket, e)));
            }
        };
        info!("服务端在{}上监听Socket连接", socket);
        self.serve(listener).await
    }

    /// 在已绑定的监听器上服务，直到收到 Ctrl-C
    pub async fn serve(self, listener: TcpListener) -> Result<(), Exception> {
        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// 在已绑定的监听器上服务，`shutdown` 完成时停止接受新连接
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Exception>
    where
        F: Future<Output = ()>,
    {
        let engine = Arc::new(self);
        tokio::pin!(shutdown);
        let mut id: u128 = 0;

        loop {
            let (mut stream, addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("收到停机信号，停止接受新连接");
                    return Ok(());
                }
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(&mut stream, id, engine).await {
                    error!("[ID{}]处理连接时遇到错误：{}", id, e);
                }
            });
            id += 1;
        }
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取并解析请求、调度、发送响应。
async fn handle_connection(stream: &mut TcpStream, id: u128, engine: Arc<Engine>) -> Result<(), Exception> {
    let read_timeout = engine.config().read_timeout();
    let write_timeout = engine.config().write_timeout();
    let max_body_size = engine.config().max_body_size();

    let buffer = match timeout(read_timeout, read_request(stream, max_body_size)).await {
        Ok(Ok(buffer)) => buffer,
        Ok(Err(e)) => {
            warn!("[ID{}]读取HTTP请求失败：{}", id, e);
            let mut response = Response::from_exception(&e);
            return write_response(stream, &mut response, write_timeout).await;
        }
        Err(_) => {
            warn!("[ID{}]读取HTTP请求超时", id);
            return Ok(());
        }
    };
    if buffer.is_empty() {
        // 客户端主动关闭连接
        return Ok(());
    }

    let mut response = match Request::try_from(&buffer, id) {
        Ok(request) => tokio::task::spawn_blocking(move || engine.handle(request))
            .await
            .map_err(|e| Exception::HandlerPanicked(e.to_string()))?,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败：{}", id, e);
            Response::from_exception(&e)
        }
    };
    write_response(stream, &mut response, write_timeout).await
}

async fn write_response(
    stream: &mut TcpStream,
    response: &mut Response,
    write_timeout: std::time::Duration,
) -> Result<(), Exception> {
    let bytes = response.as_bytes();
    match timeout(write_timeout, async {
        stream.write_all(&bytes).await?;
        stream.flush().await
    })
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => Err(Exception::Io("write timed out".to_string())),
    }
}

/// 读取一个完整的请求：先读到空行，再按 `Content-Length` 读取请求体
async fn read_request(stream: &mut TcpStream, max_body_size: usize) -> Result<Vec<u8>, Exception> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let body_start = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(end) = header_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_HEADER_SIZE {
            return Err(Exception::MalformedRequest("header section too large".to_string()));
        }
    };

    let content_length = content_length(&buffer[..body_start])?;
    if content_length > max_body_size {
        return Err(Exception::PayloadTooLarge(max_body_size));
    }

    let total = body_start + content_length;
    while buffer.len() < total {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Exception::MalformedRequest("unexpected EOF in request body".to_string()));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    buffer.truncate(total);
    Ok(buffer)
}

/// 从请求头部分提取 `Content-Length`，缺失时为 0
fn content_length(head: &[u8]) -> Result<usize, Exception> {
    let head = String::from_utf8_lossy(head);
    for line in head.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                return value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| Exception::MalformedRequest(format!("invalid Content-Length: {}", value.trim())));
            }
        }
    }
    Ok(0)
}
