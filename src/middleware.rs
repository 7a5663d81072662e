// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内置中间件
//!
//! 日志、恢复与 CORS 都是普通的 [`HandlerFunc`]，和路由处理函数以完全相同的方式组合。
//! 日志与恢复中间件在内部调用 [`Context::next`]，因此它们的作用域覆盖整个剩余调用链。

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use log::{error, info, warn};
use serde_json::json;

use crate::{
    context::{handler, Context, HandlerFunc},
    exception::Exception,
    param::HttpRequestMethod,
};

const CORS_ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE, UPDATE";
const CORS_ALLOW_HEADERS: &str = "Authorization, Content-Length, X-CSRF-Token, Token, session, X_Requested_With, Accept, Origin, Host, Connection, Accept-Encoding, Accept-Language, DNT, X-CustomHeader, Keep-Alive, User-Agent, X-Requested-With, If-Modified-Since, Cache-Control, Content-Type, Pragma";
const CORS_EXPOSE_HEADERS: &str = "Content-Length, Access-Control-Allow-Origin, Access-Control-Allow-Headers, Cache-Control, Content-Language, Content-Type, Expires, Last-Modified, Pragma";
const CORS_MAX_AGE: &str = "172800";

/// 每个请求输出一行日志：推断状态码（匹配 200，否则 404，仅用于日志）、方法、路径、
/// `Content-Length` 与耗时。
///
/// 日志在 `AccessLog` 被丢弃时写出，因此剩余调用链 panic 时同样会记录。
pub fn logger() -> HandlerFunc {
    handler(|c| {
        let _access = AccessLog::new(c);
        c.next()
    })
}

/// 一条访问日志，离开作用域时输出
struct AccessLog {
    id: u128,
    code: u16,
    method: HttpRequestMethod,
    path: String,
    content_length: String,
    start: Instant,
}

impl AccessLog {
    fn new(c: &Context) -> Self {
        let request = c.request();
        Self {
            id: request.id(),
            code: if c.matched() { 200 } else { 404 },
            method: request.method(),
            path: request.path().to_string(),
            content_length: request.header("Content-Length").unwrap_or_default().to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for AccessLog {
    fn drop(&mut self) {
        info!(
            "[ID{}] |{}| |{}| \"{:>6}\" |{:>6}| {}µs",
            self.id,
            self.code,
            self.method,
            self.path,
            self.content_length,
            self.start.elapsed().as_micros()
        );
    }
}

/// 捕获剩余调用链中的故障与 panic，并转换为 JSON 错误响应。
///
/// - 处理函数返回的 `Exception`：使用其状态码（客户端输入错误为 4xx，内部错误为 5xx）。
/// - panic：`500 {"error": "Internal Server Error"}`。
pub fn recovery() -> HandlerFunc {
    handler(|c| {
        match panic::catch_unwind(AssertUnwindSafe(|| c.next())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("[ID{}]调用链返回错误：{}", c.request().id(), e);
                write_fault(c, &e)
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("[ID{}]Panic: {}", c.request().id(), reason);
                c.abort();
                c.response_mut().clear();
                c.json(500, &json!({"error": "Internal Server Error"}))
            }
        }
    })
}

/// 为带 `Origin` 头的请求设置宽松的 CORS 响应头；OPTIONS 请求直接以 200 应答并终止调用链。
pub fn cors() -> HandlerFunc {
    handler(|c| {
        if !c.get_header("Origin").is_empty() {
            c.header("Access-Control-Allow-Origin", "*")
                .header("Access-Control-Allow-Methods", CORS_ALLOW_METHODS)
                .header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)
                .header("Access-Control-Expose-Headers", CORS_EXPOSE_HEADERS)
                .header("Access-Control-Max-Age", CORS_MAX_AGE)
                .header("Access-Control-Allow-Credentials", "false");
        }
        if c.request().method() == HttpRequestMethod::Options {
            return c.abort_with_status_json(200, "Options Request!");
        }
        Ok(())
    })
}

/// 丢弃已写入的内容并写入故障对应的 JSON 错误响应
pub(crate) fn write_fault(c: &mut Context, e: &Exception) -> Result<(), Exception> {
    let code = e.status_code();
    let message = if e.is_client_error() {
        e.to_string()
    } else {
        "Internal Server Error".to_string()
    };
    c.abort();
    c.response_mut().clear();
    c.json(code, &json!({ "error": message }))
}

/// 从 panic 负载中提取可读信息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
