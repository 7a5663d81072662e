// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应模块
//!
//! `Response` 是处理函数写入的缓冲式响应。状态码与响应头在第一次写入响应体时
//! 被“提交”，之后再修改状态码或响应头都会被忽略并记录警告，
//! 这与大多数传输层“先头后体”的约束一致。

use crate::{exception::Exception, param::*};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::prelude::*;
use log::{error, warn};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    headers: Vec<(String, String)>,
    content: BytesMut,
    date: DateTime<Utc>,
    server_name: String,
    /// 状态码与响应头是否已经提交
    committed: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            headers: Vec::new(),
            content: BytesMut::new(),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            committed: false,
        }
    }

    /// 传输层在请求无法进入调度引擎时使用的错误响应
    pub fn from_exception(e: &Exception) -> Self {
        let mut response = Self::new();
        response.write_header(e.status_code()).write(e.to_string().as_bytes());
        response
    }

    /// 设置状态码。响应已提交时调用无效。
    pub fn write_header(&mut self, code: u16) -> &mut Self {
        if self.committed {
            warn!("响应已提交，忽略多余的状态码设置：{}", code);
            return self;
        }
        self.set_code(code)
    }

    /// 设置（覆盖）一个响应头。响应已提交时调用无效。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.committed {
            warn!("响应已提交，忽略响应头：{}", name);
            return self;
        }
        match self
            .headers
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(index) => self.headers[index].1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    /// 追加响应体，并提交状态码与响应头
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        self.committed = true;
        self.content.put_slice(data);
        self
    }

    /// 丢弃已写入的全部内容，恢复为新建状态。恢复中间件在写错误响应前调用。
    pub fn clear(&mut self) {
        self.status_code = 200;
        self.information = "OK".to_string();
        self.headers.clear();
        self.content.clear();
        self.committed = false;
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&debug) => debug.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                String::new()
            }
        };
        self
    }

    fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    /// 序列化为完整的 HTTP 响应报文
    pub fn as_bytes(&mut self) -> Vec<u8> {
        self.set_date();
        let mut header = String::with_capacity(256);
        header.push_str(&format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        ));
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        if self.header("Content-Type").is_none() && !self.content.is_empty() {
            header.push_str(&["Content-Type: text/plain;charset=utf-8", CRLF].concat());
        }
        header.push_str(&format!("Content-Length: {}{}", self.content.len(), CRLF));
        header.push_str(&["Date: ", &format_date(&self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        header.push_str(&["Connection: close", CRLF, CRLF].concat());

        [header.as_bytes(), &self.content[..]].concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    /// 按名称查找响应头（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.content)
    }

    /// 以 UTF-8 字符串形式读取响应体（非法字节被替换）
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
