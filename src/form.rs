// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单解析模块
//!
//! 提供上下文缓存所需的三种键值来源：
//! - URL 查询字符串
//! - `application/x-www-form-urlencoded` 请求体（追加 URL 查询参数）
//! - `multipart/form-data` 请求体（普通字段与上传文件分开存放）

use std::collections::HashMap;

use bytes::Bytes;
use log::debug;
use memchr::memmem;

use crate::{exception::Exception, request::Request};

/// 一个键对应多个值的映射，值按出现顺序保存
pub type Values = HashMap<String, Vec<String>>;

/// multipart 表单中的一个上传文件
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// 解析后的 multipart 表单
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    /// 普通文本字段
    pub value: Values,
    /// 带 `filename` 的文件字段
    pub file: HashMap<String, Vec<FileHeader>>,
}

impl MultipartForm {
    pub fn clear(&mut self) {
        self.value.clear();
        self.file.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.file.is_empty()
    }

    /// 取字段的第一个值；键不存在或值列表为空时返回 `None`
    pub fn first_value(&self, key: &str) -> Option<&str> {
        self.value
            .get(key)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }
}

/// 取出媒体类型部分（去掉参数并转为小写）
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// 在 `key=value; key="value"` 形式的参数串里查找参数
fn header_param<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// 把 URL 编码的键值对追加到 `values`
pub fn parse_urlencoded(input: &[u8], values: &mut Values) {
    for (key, value) in url::form_urlencoded::parse(input) {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
}

/// 解析 POST 表单：请求体中的字段在前，URL 查询参数在后。
///
/// 只有 `Content-Type` 为 `application/x-www-form-urlencoded` 时才读取请求体。
pub fn parse_form(request: &Request, max_size: usize, values: &mut Values) -> Result<(), Exception> {
    let is_urlencoded = request
        .content_type()
        .map(|ct| media_type(ct) == "application/x-www-form-urlencoded")
        .unwrap_or(false);

    if is_urlencoded {
        let body = request.body();
        if body.len() > max_size {
            return Err(Exception::BodyParse(format!(
                "urlencoded body of {} bytes exceeds {} bytes",
                body.len(),
                max_size
            )));
        }
        parse_urlencoded(body, values);
    }
    parse_urlencoded(request.raw_query().as_bytes(), values);
    Ok(())
}

/// 解析 multipart/form-data 请求体。
///
/// 非 multipart 请求不视为错误，`form` 保持为空。
pub fn parse_multipart(
    request: &Request,
    max_memory: usize,
    form: &mut MultipartForm,
) -> Result<(), Exception> {
    let content_type = match request.content_type() {
        Some(ct) if media_type(ct) == "multipart/form-data" => ct,
        _ => return Ok(()),
    };
    let boundary = match header_param(content_type, "boundary") {
        Some(b) if !b.is_empty() => b,
        _ => {
            return Err(Exception::BodyParse(
                "no multipart boundary param in Content-Type".to_string(),
            ))
        }
    };
    let body = request.body();
    if body.len() > max_memory {
        return Err(Exception::BodyParse(format!(
            "multipart body of {} bytes exceeds {} bytes",
            body.len(),
            max_memory
        )));
    }

    let delimiter = format!("--{}", boundary);
    let next_delimiter = format!("\r\n--{}", boundary);

    let mut pos = match memmem::find(body, delimiter.as_bytes()) {
        Some(start) => start + delimiter.len(),
        None => return Err(Exception::BodyParse("multipart: missing first boundary".to_string())),
    };

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            // 结束分隔符
            return Ok(());
        }
        if !rest.starts_with(b"\r\n") {
            return Err(Exception::BodyParse("multipart: malformed boundary line".to_string()));
        }
        let part = &rest[2..];

        // 头部为空时分隔行之后紧跟空行
        let (head, content_start) = if part.starts_with(b"\r\n") {
            ("", 2)
        } else {
            let head_len = match memmem::find(part, b"\r\n\r\n") {
                Some(len) => len,
                None => return Err(Exception::BodyParse("multipart: unterminated part headers".to_string())),
            };
            let head = std::str::from_utf8(&part[..head_len])
                .map_err(|_| Exception::BodyParse("multipart: part headers are not UTF-8".to_string()))?;
            (head, head_len + 4)
        };

        let content_len = match memmem::find(&part[content_start..], next_delimiter.as_bytes()) {
            Some(len) => len,
            None => return Err(Exception::BodyParse("multipart: unexpected EOF".to_string())),
        };
        let content = &part[content_start..content_start + content_len];

        add_part(head, content, form);

        pos += 2 + content_start + content_len + next_delimiter.len();
    }
}

/// 把一个 part 放入表单。没有 `name` 的 part 被忽略。
fn add_part(head: &str, content: &[u8], form: &mut MultipartForm) {
    let mut disposition = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("Content-Disposition") {
                disposition = Some(value.trim());
            } else if name.trim().eq_ignore_ascii_case("Content-Type") {
                content_type = Some(value.trim().to_string());
            }
        }
    }

    let disposition = match disposition {
        Some(d) if media_type(d) == "form-data" => d,
        _ => return,
    };
    let name = match header_param(disposition, "name") {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => {
            debug!("multipart part 缺少 name，已忽略");
            return;
        }
    };

    match header_param(disposition, "filename") {
        Some(filename) => form.file.entry(name).or_default().push(FileHeader {
            filename: filename.to_string(),
            content_type,
            content: Bytes::copy_from_slice(content),
        }),
        None => form
            .value
            .entry(name)
            .or_default()
            .push(String::from_utf8_lossy(content).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(content_type: &str, body: &str) -> Request {
        let raw = format!(
            "POST /login?from=query HTTP/1.1\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
            content_type,
            body.len(),
            body
        );
        Request::try_from(raw.as_bytes(), 0).unwrap()
    }

    const MULTIPART_BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"account\"\r\n\r\n\
        alice\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        PNGDATA\r\n\
        --XyZ--\r\n";

    #[test]
    fn test_parse_urlencoded_decodes() {
        let mut values = Values::new();
        parse_urlencoded(b"name=John+Doe&tag=a&tag=b%21", &mut values);

        assert_eq!(values["name"], vec!["John Doe"]);
        assert_eq!(values["tag"], vec!["a", "b!"]);
    }

    #[test]
    fn test_parse_form_body_before_query() {
        let request = post("application/x-www-form-urlencoded", "account=bob&from=body");
        let mut values = Values::new();

        parse_form(&request, 1024, &mut values).unwrap();

        assert_eq!(values["account"], vec!["bob"]);
        assert_eq!(values["from"], vec!["body", "query"]);
    }

    #[test]
    fn test_parse_form_ignores_other_content_types() {
        let request = post("text/plain", "account=bob");
        let mut values = Values::new();

        parse_form(&request, 1024, &mut values).unwrap();

        assert!(values.get("account").is_none());
        assert_eq!(values["from"], vec!["query"]);
    }

    #[test]
    fn test_parse_form_too_large() {
        let request = post("application/x-www-form-urlencoded", "account=bob");
        let mut values = Values::new();

        let result = parse_form(&request, 4, &mut values);

        assert!(matches!(result, Err(Exception::BodyParse(_))));
    }

    #[test]
    fn test_parse_multipart_values_and_files() {
        let request = post("multipart/form-data; boundary=XyZ", MULTIPART_BODY);
        let mut form = MultipartForm::default();

        parse_multipart(&request, 1 << 20, &mut form).unwrap();

        assert_eq!(form.first_value("account"), Some("alice"));
        let avatar = &form.file["avatar"][0];
        assert_eq!(avatar.filename, "a.png");
        assert_eq!(avatar.content_type.as_deref(), Some("image/png"));
        assert_eq!(&avatar.content[..], b"PNGDATA");
        assert_eq!(form.first_value("avatar"), None);
    }

    #[test]
    fn test_parse_multipart_quoted_boundary() {
        let request = post("multipart/form-data; boundary=\"XyZ\"", MULTIPART_BODY);
        let mut form = MultipartForm::default();

        parse_multipart(&request, 1 << 20, &mut form).unwrap();

        assert_eq!(form.first_value("account"), Some("alice"));
    }

    #[test]
    fn test_parse_multipart_skips_non_multipart() {
        let request = post("application/x-www-form-urlencoded", "a=b");
        let mut form = MultipartForm::default();

        parse_multipart(&request, 1 << 20, &mut form).unwrap();

        assert!(form.is_empty());
    }

    #[test]
    fn test_parse_multipart_missing_boundary() {
        let request = post("multipart/form-data", MULTIPART_BODY);
        let mut form = MultipartForm::default();

        let result = parse_multipart(&request, 1 << 20, &mut form);

        assert!(matches!(result, Err(Exception::BodyParse(_))));
    }

    #[test]
    fn test_parse_multipart_part_without_headers_is_ignored() {
        let body = "--XyZ\r\n\r\nanonymous\r\n\
                    --XyZ\r\nContent-Disposition: form-data; name=\"account\"\r\n\r\nalice\r\n\
                    --XyZ--\r\n";
        let request = post("multipart/form-data; boundary=XyZ", body);
        let mut form = MultipartForm::default();

        parse_multipart(&request, 1 << 20, &mut form).unwrap();

        assert_eq!(form.first_value("account"), Some("alice"));
        assert_eq!(form.value.len(), 1);
        assert!(form.file.is_empty());
    }

    #[test]
    fn test_parse_multipart_truncated() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";
        let request = post("multipart/form-data; boundary=XyZ", body);
        let mut form = MultipartForm::default();

        let result = parse_multipart(&request, 1 << 20, &mut form);

        assert!(matches!(result, Err(Exception::BodyParse(_))));
    }

    #[test]
    fn test_parse_multipart_too_large() {
        let request = post("multipart/form-data; boundary=XyZ", MULTIPART_BODY);
        let mut form = MultipartForm::default();

        let result = parse_multipart(&request, 16, &mut form);

        assert!(matches!(result, Err(Exception::BodyParse(_))));
    }
}
