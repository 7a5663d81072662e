// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webchain
//!
//! 一个最小化的 HTTP 调度引擎：按方法分表的精确路径路由、全局中间件与路由处理函数
//! 组成的调用链、由游标驱动的 `Context`（支持 `next`/`abort`）、查询与表单缓存、
//! JSON 输出、`Context` 对象池，以及日志、恢复、CORS 三个内置中间件。

pub mod config;
pub mod context;
pub mod engine;
pub mod exception;
pub mod form;
pub mod middleware;
pub mod param;
pub mod pool;
pub mod request;
pub mod response;
pub mod server;

pub use config::Config;
pub use context::{handler, Context, HandlerFunc, HandlersChain};
pub use engine::{Engine, Route};
pub use exception::Exception;
pub use form::FileHeader;
pub use middleware::{cors, logger, recovery};
pub use param::{HttpRequestMethod, HttpVersion};
pub use pool::ContextPool;
pub use request::Request;
pub use response::Response;
