// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了调度引擎在请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：区分客户端输入错误（4xx）与服务端内部错误（5xx），
//!   恢复中间件据此生成不同的响应。
//! - **语义映射**：每个变体都通过 [`Exception::status_code`] 对应一个 HTTP 状态码。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志或返回给客户端。

use std::fmt;

use crate::param::HttpRequestMethod;

/// 服务器处理请求过程中发生的异常类型。
///
/// 处理函数通过返回 `Err(Exception)` 抛出故障，调用链随即终止。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行或请求头格式不正确。
    MalformedRequest(String),
    /// 客户端使用了解析器不认识的 HTTP 方法。对应 `501 Not Implemented`。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求体超过配置的上限。对应 `413 Content Too Large`。
    PayloadTooLarge(usize),
    /// URL 编码表单或 multipart 表单无法解析。属于客户端输入错误。
    BodyParse(String),
    /// 响应值无法被序列化为 JSON。属于服务端内部错误。
    Serialization(String),
    /// 处理函数发生 panic，恢复边界将其转换为该异常。
    HandlerPanicked(String),
    /// 试图为不支持路由的方法注册路由。
    UnroutableMethod(HttpRequestMethod),
    /// 启动时无法绑定监听地址。
    Bind(String),
    /// 读写套接字时发生的 I/O 错误。
    Io(String),
}

use Exception::*;

impl Exception {
    /// 该异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest(_) | BodyParse(_) => 400,
            PayloadTooLarge(_) => 413,
            UnSupportedRequestMethod => 501,
            UnsupportedHttpVersion => 505,
            Serialization(_) | HandlerPanicked(_) | UnroutableMethod(_) | Bind(_) | Io(_) => 500,
        }
    }

    /// 是否由客户端的错误输入引起
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest(reason) => write!(f, "Malformed request: {}", reason),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            PayloadTooLarge(limit) => write!(f, "Request body exceeds {} bytes", limit),
            BodyParse(reason) => write!(f, "Failed to parse request body: {}", reason),
            Serialization(reason) => write!(f, "Failed to serialize JSON: {}", reason),
            HandlerPanicked(reason) => write!(f, "Handler panicked: {}", reason),
            UnroutableMethod(method) => write!(f, "Routes can't be registered for {}", method),
            Bind(reason) => write!(f, "Failed to bind listener: {}", reason),
            Io(reason) => write!(f, "I/O error: {}", reason),
        }
    }
}

impl From<std::io::Error> for Exception {
    fn from(e: std::io::Error) -> Self {
        Io(e.to_string())
    }
}

impl From<serde_json::Error> for Exception {
    fn from(e: serde_json::Error) -> Self {
        Serialization(e.to_string())
    }
}
