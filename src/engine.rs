// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 调度引擎
//!
//! 引擎负责：
//! 1. 路由注册：每个方法一张按注册顺序排列的路由表，精确匹配路径，先注册者优先。
//! 2. 中间件注册：全局中间件总是排在路由处理函数之前。
//! 3. 请求调度：从上下文池取出 `Context`，填充缓存、匹配路由、组合调用链、执行，最后归还。
//!
//! 注册方法都需要 `&mut Engine`。开始服务时引擎被移入 `Arc`，
//! 因此服务期间路由表与中间件列表在类型层面上就是只读的。

use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
};

use log::{debug, error, info, warn};

use crate::{
    config::Config,
    context::{Context, HandlerFunc, HandlersChain},
    exception::Exception,
    middleware::{panic_message, write_fault},
    param::*,
    pool::ContextPool,
    request::Request,
    response::Response,
};

/// 一条已注册的路由
#[derive(Clone)]
pub struct Route {
    method: HttpRequestMethod,
    path: String,
    handlers: HandlersChain,
}

impl Route {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handlers(&self) -> &[HandlerFunc] {
        &self.handlers
    }
}

pub struct Engine {
    method_tree: HashMap<HttpRequestMethod, Vec<Route>>,
    middlewares: HandlersChain,
    pool: ContextPool,
    config: Config,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// 使用默认配置创建引擎
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// 使用给定配置创建引擎。四个可路由方法的路由表在此时创建，初始为空。
    pub fn with_config(config: Config) -> Self {
        let method_tree = ROUTABLE_METHODS
            .iter()
            .map(|method| (*method, Vec::new()))
            .collect();
        Self {
            method_tree,
            middlewares: HandlersChain::new(),
            pool: ContextPool::with_capacity(config.pool_capacity()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }
}

// --- 注册 ---

impl Engine {
    pub fn get(&mut self, path: &str, handlers: HandlersChain) -> &mut Self {
        self.push_route(HttpRequestMethod::Get, path, handlers)
    }

    pub fn post(&mut self, path: &str, handlers: HandlersChain) -> &mut Self {
        self.push_route(HttpRequestMethod::Post, path, handlers)
    }

    pub fn put(&mut self, path: &str, handlers: HandlersChain) -> &mut Self {
        self.push_route(HttpRequestMethod::Put, path, handlers)
    }

    pub fn delete(&mut self, path: &str, handlers: HandlersChain) -> &mut Self {
        self.push_route(HttpRequestMethod::Delete, path, handlers)
    }

    /// 添加新的路由。路径原样保存，不做校验，也不检测重复。
    pub fn add_route(
        &mut self,
        method: HttpRequestMethod,
        path: &str,
        handlers: HandlersChain,
    ) -> Result<&mut Self, Exception> {
        if !method.is_routable() {
            error!("无法为{}方法注册路由：{}", method, path);
            return Err(Exception::UnroutableMethod(method));
        }
        Ok(self.push_route(method, path, handlers))
    }

    fn push_route(&mut self, method: HttpRequestMethod, path: &str, handlers: HandlersChain) -> &mut Self {
        let routes = self.method_tree.entry(method).or_default();
        if routes.iter().any(|route| route.path == path) {
            warn!("路由{} {}已存在，新注册的处理函数永远不会被匹配", method, path);
        }
        routes.push(Route {
            method,
            path: path.to_string(),
            handlers,
        });
        info!("[webchain]-- {:<7} {}", method, path);
        self
    }

    /// 追加全局中间件
    pub fn add_middleware(&mut self, handlers: HandlersChain) -> &mut Self {
        self.middlewares.extend(handlers);
        self
    }

    /// 某个方法下已注册的路由，按匹配优先级排列
    pub fn routes(&self, method: HttpRequestMethod) -> &[Route] {
        self.method_tree
            .get(&method)
            .map(|routes| routes.as_slice())
            .unwrap_or_default()
    }
}

// --- 调度 ---

impl Engine {
    /// 处理一个请求并返回响应。
    ///
    /// 整个调度过程处于恢复边界之内：逃逸出调用链的故障或 panic 都会被转换为对应状态码的
    /// JSON 错误响应，上下文总会被归还到池中。
    pub fn handle(&self, request: Request) -> Response {
        let id = request.id();
        let mut context = self.pool.acquire();
        context.bind(request);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle_http_request(&mut context)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("[ID{}]请求处理失败：{}", id, e);
                if let Err(fault) = write_fault(&mut context, &e) {
                    error!("[ID{}]无法写入错误响应：{}", id, fault);
                }
            }
            Err(payload) => {
                let e = Exception::HandlerPanicked(panic_message(payload.as_ref()));
                error!("[ID{}]{}", id, e);
                if let Err(fault) = write_fault(&mut context, &e) {
                    error!("[ID{}]无法写入错误响应：{}", id, fault);
                }
            }
        }

        let response = context.take_response();
        self.pool.release(context);
        response
    }

    /// 填充缓存、匹配路由并执行调用链
    fn handle_http_request(&self, c: &mut Context) -> Result<(), Exception> {
        match c.request().method() {
            HttpRequestMethod::Get => c.load_query(),
            HttpRequestMethod::Post => {
                c.load_forms(self.config.max_form_size(), self.config.max_multipart_memory())?
            }
            _ => {}
        }

        if let Some(route) = self.match_route(c.request()) {
            debug!("[ID{}]匹配到路由：{} {}", c.request().id(), route.method, route.path);
            c.set_matched(true);
            c.set_handlers(&self.middlewares, &route.handlers);
            return c.next();
        }

        debug!(
            "[ID{}]未匹配到路由：{} {}",
            c.request().id(),
            c.request().method(),
            c.request().path()
        );
        c.set_matched(false);
        c.set_handlers(&self.middlewares, &[]);
        c.next()?;
        if !c.is_aborted() {
            c.write(FALLBACK_BODY);
        }
        Ok(())
    }

    /// 在请求方法对应的路由表中线性查找，路径精确相等的第一条路由胜出
    fn match_route(&self, request: &Request) -> Option<&Route> {
        self.method_tree
            .get(&request.method())?
            .iter()
            .find(|route| route.path == request.path())
    }
}
