// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询字符串、版本）。
//! 2. 全部请求头（Headers）的提取，查找时大小写不敏感。
//! 3. 请求体（Body）的切分，长度由 `Content-Length` 决定。

use crate::{exception::Exception, param::*};

use bytes::Bytes;
use log::error;
use memchr::memmem;

/// 表示一个完整的 HTTP 请求。
///
/// 由传输层构建一次，之后以只读方式交给调度引擎和处理函数。
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// 全局请求 ID，用于在多线程环境下追踪日志
    id: u128,
    /// HTTP 请求方法
    method: HttpRequestMethod,
    /// 百分号解码后的路径，不含查询字符串
    path: String,
    /// 原始查询字符串（不含 `?`）
    raw_query: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的请求头
    headers: Vec<(String, String)>,
    /// 请求体
    body: Bytes,
}

/// 在缓冲区中查找请求头结束位置，返回请求体的起始偏移。
pub fn header_end(buffer: &[u8]) -> Option<usize> {
    memmem::find(buffer, HEADER_END).map(|pos| pos + HEADER_END.len())
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 切分请求头与请求体，并验证请求头是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径、查询字符串和协议版本。
    /// 3. 逐行解析请求头。
    /// 4. 按 `Content-Length` 截取请求体。
    ///
    /// # 错误处理
    /// 如果请求格式不符合 HTTP 规范或使用了不支持的方法/版本，将返回相应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 没有空行分隔时，整个缓冲区都视为请求头
        let (head, rest) = match header_end(buffer) {
            Some(end) => (&buffer[..end - HEADER_END.len()], &buffer[end..]),
            None => (buffer, &buffer[buffer.len()..]),
        };
        let head = match std::str::from_utf8(head) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = head.split(CRLF);

        // 2. 解析请求行 (e.g., "GET /index.html?x=1 HTTP/1.1")
        let request_line = request_lines.next().unwrap_or_default();
        let first_line_parts: Vec<&str> = request_line.split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest(request_line.to_string()));
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            "PUT" => HttpRequestMethod::Put,
            "DELETE" => HttpRequestMethod::Delete,
            "PATCH" => HttpRequestMethod::Patch,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (raw_path, raw_query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target.as_str(), ""),
        };
        let path = match urlencoding::decode(raw_path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw_path.to_string(),
        };

        // 3. 解析请求头
        let mut headers = Vec::new();
        for line in request_lines {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    error!("[ID{}]无法解析请求头：{}", id, line);
                    return Err(Exception::MalformedRequest(line.to_string()));
                }
            }
        }

        let mut request = Self {
            id,
            method,
            path,
            raw_query: raw_query.to_string(),
            version,
            headers,
            body: Bytes::new(),
        };

        // 4. 截取请求体，多余的字节被丢弃
        let body_len = match request.content_length() {
            Some(len) => len.min(rest.len()),
            None => rest.len(),
        };
        request.body = Bytes::copy_from_slice(&rest[..body_len]);

        Ok(request)
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取请求 ID
    pub fn id(&self) -> u128 {
        self.id
    }

    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取解码后的请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取原始查询字符串
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 按名称查找请求头（大小写不敏感），返回第一个匹配的值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// 获取全部请求头
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 解析 `Content-Length`
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|value| value.parse::<usize>().ok())
    }

    /// 获取 `Content-Type`
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or_default()
    }

    /// 获取请求体
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path、Query 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET /ping?name=John&age=25 HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: Test-Browser\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/ping");
        assert_eq!(request.raw_query(), "name=John&age=25");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.header("host"), Some("localhost:8080"));
        assert!(request.body().is_empty());
    }

    /// 验证 PUT / DELETE 请求可以被识别
    #[test]
    fn test_parse_put_and_delete() {
        let put = Request::try_from(b"PUT /put/test HTTP/1.1\r\nHost: a\r\n\r\n", 0).unwrap();
        let delete = Request::try_from(b"DELETE /delete/test HTTP/1.1\r\nHost: a\r\n\r\n", 0).unwrap();

        assert_eq!(put.method(), HttpRequestMethod::Put);
        assert_eq!(delete.method(), HttpRequestMethod::Delete);
        assert_eq!(delete.path(), "/delete/test");
    }

    /// 验证 OPTIONS 请求（常用于 CORS 预检）
    #[test]
    fn test_parse_options_request() {
        let request_str = "OPTIONS * HTTP/1.1\r\nHost: localhost\r\nOrigin: http://a.com\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Options);
        assert_eq!(request.path(), "*");
        assert_eq!(request.header("origin"), Some("http://a.com"));
    }

    /// 验证 POST 请求体按 Content-Length 截取
    #[test]
    fn test_parse_post_body() {
        let request_str = "POST /login HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 10\r\n\r\naccount=abEXTRA";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.content_length(), Some(10));
        assert_eq!(request.content_type(), Some("application/x-www-form-urlencoded"));
        assert_eq!(&request.body()[..], b"account=ab");
    }

    /// 请求体可以包含非 UTF-8 字节
    #[test]
    fn test_binary_body() {
        let mut buffer = b"POST /upload HTTP/1.1\r\nContent-Length: 3\r\n\r\n".to_vec();
        buffer.extend_from_slice(&[0xFF, 0x00, 0xFE]);

        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(&request.body()[..], &[0xFF, 0x00, 0xFE]);
    }

    /// 确保不认识的 HTTP 方法会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "BREW /pot HTTP/1.1\r\nHost: localhost\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];

        let result = Request::try_from(&buffer, 0);

        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    /// 请求行缺少字段时返回格式错误
    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET /\r\n\r\n", 0);

        assert!(matches!(result, Err(Exception::MalformedRequest(_))));
    }

    /// 路径会被百分号解码，且不做其它规范化
    #[test]
    fn test_path_is_decoded_but_not_normalized() {
        let request = Request::try_from(b"GET /a%20b/ HTTP/1.1\r\n\r\n", 0).unwrap();

        assert_eq!(request.path(), "/a b/");
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request = Request::try_from(b"get / HTTP/1.1\r\nHost: localhost\r\n\r\n", 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    #[test]
    fn test_header_end() {
        assert_eq!(header_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
        assert_eq!(header_end(b"GET / HTTP/1.1\r\n"), None);
    }
}
