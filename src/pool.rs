// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 上下文复用池
//!
//! 基于 `crossbeam::queue::ArrayQueue` 的无锁对象池：
//! - `acquire`：弹出一个空闲的 `Context`，池为空时新建一个（游标为 `-1`）。
//! - `release`：先调用 [`Context::reset`] 再放回；池已满时直接丢弃。
//!
//! `pop` 保证同一个实例同一时刻只会交给一个请求。

use crossbeam::queue::ArrayQueue;
use log::debug;

use crate::context::Context;

pub struct ContextPool {
    idle: ArrayQueue<Box<Context>>,
}

impl ContextPool {
    /// 创建指定容量的池。容量为 0 时按 1 处理。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// 取出一个可用的上下文
    pub fn acquire(&self) -> Box<Context> {
        match self.idle.pop() {
            Some(context) => context,
            None => Box::new(Context::new()),
        }
    }

    /// 重置并归还上下文
    pub fn release(&self, mut context: Box<Context>) {
        context.reset();
        if self.idle.push(context).is_err() {
            debug!("上下文池已满，丢弃多余的实例");
        }
    }

    /// 当前空闲实例数
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }
}
