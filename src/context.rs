// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文模块
//!
//! `Context` 是单个请求的可变状态：请求与响应、按需填充的查询/表单缓存、
//! 本次请求的处理函数链，以及驱动调用链的游标 `index`。
//!
//! ## 游标模型
//! - 初始值为 `-1`，表示“尚未开始”。
//! - [`Context::next`] 先把游标加一，然后在游标有效时循环执行
//!   `handlers[index]` 并继续加一，一次调用即可跑完剩余的整条链。
//! - 处理函数可以在内部调用 `next()`，从而把链的剩余部分包在自己的作用域里
//!   （恢复、计时）。游标是共享的，外层循环在它返回后看到的是已经越界的游标，
//!   因此不会重复执行任何处理函数。
//! - [`Context::abort`] 把游标设为 [`ABORT_INDEX`]，所有正在进行与之后的循环立即停止。

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::{
    exception::Exception,
    form::{self, FileHeader, MultipartForm, Values},
    request::Request,
    response::Response,
};

/// 处理函数。中间件与路由处理函数在组合后没有结构上的区别。
pub type HandlerFunc = Arc<dyn Fn(&mut Context) -> Result<(), Exception> + Send + Sync>;

/// 有序的处理函数链
pub type HandlersChain = Vec<HandlerFunc>;

/// 游标的初始值
pub const INITIAL_INDEX: isize = -1;

/// 终止调用链时写入游标的哨兵值，远大于任何可能的链长度
pub const ABORT_INDEX: isize = isize::MAX / 2;

/// 把闭包包装为 [`HandlerFunc`]
pub fn handler<F>(f: F) -> HandlerFunc
where
    F: Fn(&mut Context) -> Result<(), Exception> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 由若干闭包构建处理函数链
///
/// ```
/// use webchain::{chain, HandlersChain};
///
/// let handlers: HandlersChain = chain![|c| {
///     c.write("pong");
///     Ok(())
/// }];
/// assert_eq!(handlers.len(), 1);
/// ```
#[macro_export]
macro_rules! chain {
    ($($h:expr),* $(,)?) => {
        vec![$($crate::context::handler($h)),*]
    };
}

pub struct Context {
    request: Request,
    response: Response,
    query_cache: Values,
    form_cache: Values,
    multipart_cache: MultipartForm,
    matched: bool,
    handlers: HandlersChain,
    index: isize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            request: Request::default(),
            response: Response::new(),
            query_cache: Values::new(),
            form_cache: Values::new(),
            multipart_cache: MultipartForm::default(),
            matched: false,
            handlers: HandlersChain::new(),
            index: INITIAL_INDEX,
        }
    }

    /// 绑定新请求
    pub(crate) fn bind(&mut self, request: Request) {
        self.request = request;
    }

    /// 恢复到刚创建时的状态。缓存与处理链只清空不释放，以便复用已分配的容量。
    pub fn reset(&mut self) {
        self.request = Request::default();
        self.response.clear();
        self.query_cache.clear();
        self.form_cache.clear();
        self.multipart_cache.clear();
        self.matched = false;
        self.handlers.clear();
        self.index = INITIAL_INDEX;
    }

    /// 取走响应，留下一个空白响应
    pub(crate) fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    pub(crate) fn set_matched(&mut self, matched: bool) {
        self.matched = matched;
    }

    /// 组合处理链：全局中间件在前，路由处理函数在后
    pub(crate) fn set_handlers(&mut self, middlewares: &[HandlerFunc], route: &[HandlerFunc]) {
        self.handlers.clear();
        self.handlers.extend(middlewares.iter().cloned());
        self.handlers.extend(route.iter().cloned());
    }

    /// 从 URL 查询字符串填充查询缓存
    pub(crate) fn load_query(&mut self) {
        form::parse_urlencoded(self.request.raw_query().as_bytes(), &mut self.query_cache);
    }

    /// 解析 POST 请求体，填充表单缓存与 multipart 缓存
    pub(crate) fn load_forms(
        &mut self,
        max_form_size: usize,
        max_multipart_memory: usize,
    ) -> Result<(), Exception> {
        form::parse_form(&self.request, max_form_size, &mut self.form_cache)?;
        form::parse_multipart(&self.request, max_multipart_memory, &mut self.multipart_cache)?;
        debug!(
            "[ID{}]表单解析完成：{}个字段，{}个multipart字段",
            self.request.id(),
            self.form_cache.len(),
            self.multipart_cache.value.len()
        );
        Ok(())
    }
}

// --- 调用链控制 ---

impl Context {
    /// 执行调用链的剩余部分。
    ///
    /// 某个处理函数返回 `Err` 时调用链被终止，错误原样返回给调用者。
    pub fn next(&mut self) -> Result<(), Exception> {
        self.index += 1;
        while self.index >= 0 && (self.index as usize) < self.handlers.len() {
            let current = Arc::clone(&self.handlers[self.index as usize]);
            if let Err(e) = (*current)(self) {
                self.abort();
                return Err(e);
            }
            self.index += 1;
        }
        Ok(())
    }

    /// 终止调用链，之后的处理函数都不会再执行
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// 写入 JSON 响应后终止调用链
    pub fn abort_with_status_json<T: Serialize + ?Sized>(
        &mut self,
        code: u16,
        value: &T,
    ) -> Result<(), Exception> {
        self.abort();
        self.json(code, value)
    }

    /// 当前游标位置
    pub fn index(&self) -> isize {
        self.index
    }
}

// --- 数据访问 ---

impl Context {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// 本次请求是否匹配到了路由
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// 处理链长度
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// 查询参数的第一个值，不存在时返回空字符串。只有 GET 请求会填充查询缓存。
    pub fn query(&self, key: &str) -> &str {
        self.query_cache
            .get(key)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
            .unwrap_or_default()
    }

    /// 查询参数的全部值
    pub fn query_array(&self, key: &str) -> &[String] {
        self.query_cache
            .get(key)
            .map(|values| values.as_slice())
            .unwrap_or_default()
    }

    /// 表单字段。先查 URL 编码表单，值为空时再查 multipart 表单；都没有时返回空字符串。
    pub fn post_form(&self, key: &str) -> &str {
        let value = self
            .form_cache
            .get(key)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
            .unwrap_or_default();
        if !value.is_empty() {
            return value;
        }
        self.multipart_cache.first_value(key).unwrap_or_default()
    }

    /// multipart 表单中某个字段的第一个上传文件
    pub fn form_file(&self, key: &str) -> Option<&FileHeader> {
        self.multipart_cache.file.get(key).and_then(|files| files.first())
    }

    /// 读取请求头
    pub fn get_header(&self, key: &str) -> &str {
        self.request.header(key).unwrap_or_default()
    }
}

// --- 响应写入 ---

impl Context {
    /// 设置响应状态码
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.response.write_header(code);
        self
    }

    /// 设置响应头
    pub fn header(&mut self, key: &str, value: &str) -> &mut Self {
        self.response.set_header(key, value);
        self
    }

    /// 追加纯文本响应体
    pub fn write(&mut self, body: &str) -> &mut Self {
        self.response.write(body.as_bytes());
        self
    }

    /// 序列化 `value` 并写入响应。状态码在写入响应体之前设置。
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) -> Result<(), Exception> {
        let data = serde_json::to_vec(value)?;
        self.response
            .set_header("Content-Type", "application/json")
            .write_header(code)
            .write(&data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<usize>>>, n: usize) -> HandlerFunc {
        let log = Arc::clone(log);
        handler(move |_| {
            log.lock().unwrap().push(n);
            Ok(())
        })
    }

    fn context_with(handlers: HandlersChain) -> Context {
        let mut c = Context::new();
        c.set_handlers(&[], &handlers);
        c
    }

    #[test]
    fn test_new_context_starts_before_first_handler() {
        let c = Context::new();

        assert_eq!(c.index(), INITIAL_INDEX);
        assert!(!c.matched());
        assert!(!c.is_aborted());
    }

    #[test]
    fn test_next_runs_whole_chain_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut c = context_with(vec![recorder(&log, 0), recorder(&log, 1), recorder(&log, 2)]);

        c.next().unwrap();

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(c.index(), 3);
    }

    #[test]
    fn test_nested_next_does_not_double_invoke() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let wrapper_log = Arc::clone(&log);
        let wrapper = handler(move |c| {
            wrapper_log.lock().unwrap().push(100);
            c.next()?;
            wrapper_log.lock().unwrap().push(101);
            Ok(())
        });
        let mut c = context_with(vec![wrapper, recorder(&log, 1), recorder(&log, 2)]);

        c.next().unwrap();

        assert_eq!(*log.lock().unwrap(), vec![100, 1, 2, 101]);
    }

    #[test]
    fn test_abort_stops_later_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let abort_log = Arc::clone(&log);
        let aborter = handler(move |c| {
            abort_log.lock().unwrap().push(1);
            c.abort();
            Ok(())
        });
        let mut c = context_with(vec![recorder(&log, 0), aborter, recorder(&log, 2)]);

        c.next().unwrap();

        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        assert!(c.is_aborted());
    }

    #[test]
    fn test_error_aborts_and_propagates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = handler(|_| Err(Exception::BodyParse("bad".to_string())));
        let mut c = context_with(vec![failing, recorder(&log, 1)]);

        let result = c.next();

        assert_eq!(result, Err(Exception::BodyParse("bad".to_string())));
        assert!(log.lock().unwrap().is_empty());
        assert!(c.is_aborted());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut c = context_with(chain![|c| {
            c.abort();
            Ok(())
        }]);
        c.bind(Request::try_from(b"GET /a?x=1 HTTP/1.1\r\n\r\n", 7).unwrap());
        c.load_query();
        c.set_matched(true);
        c.next().unwrap();
        c.write("leftover");

        c.reset();

        assert_eq!(c.index(), INITIAL_INDEX);
        assert_eq!(c.handler_count(), 0);
        assert!(!c.matched());
        assert_eq!(c.query("x"), "");
        assert_eq!(c.request().path(), "");
        assert!(c.response().body().is_empty());
    }

    #[test]
    fn test_query_accessors() {
        let mut c = Context::new();
        c.bind(Request::try_from(b"GET /ping?name=John&tag=a&tag=b HTTP/1.1\r\n\r\n", 0).unwrap());
        c.load_query();

        assert_eq!(c.query("name"), "John");
        assert_eq!(c.query("missing"), "");
        assert_eq!(c.query_array("tag"), ["a".to_string(), "b".to_string()]);
        assert!(c.query_array("missing").is_empty());
    }

    #[test]
    fn test_post_form_falls_back_to_multipart() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"password\"\r\n\r\nsecret\r\n--B--\r\n";
        let raw = format!(
            "POST /login HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=B\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut c = Context::new();
        c.bind(Request::try_from(raw.as_bytes(), 0).unwrap());
        c.load_forms(1 << 20, 1 << 20).unwrap();

        assert_eq!(c.post_form("password"), "secret");
        assert_eq!(c.post_form("account"), "");
    }

    #[test]
    fn test_json_sets_status_before_body() {
        let mut c = Context::new();

        c.json(201, &json!({"msg": "put msg"})).unwrap();

        let response = c.response();
        assert_eq!(response.status_code(), 201);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&response.body()).unwrap();
        assert_eq!(body, json!({"msg": "put msg"}));
    }

    #[test]
    fn test_json_serialization_failure_is_fault() {
        use std::collections::HashMap;

        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "non-string key");
        let mut c = Context::new();

        let result = c.json(200, &bad);

        assert!(matches!(result, Err(Exception::Serialization(_))));
        assert!(c.response().body().is_empty());
    }
}
