// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务
//!
//! 加载日志与运行配置，注册内置中间件与几条演示路由，然后开始监听。

use std::process;

use log::{error, info};
use serde_json::json;
use tokio::runtime::Builder;

use webchain::{chain, cors, logger, recovery, Config, Engine, Exception};

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    // 2. 加载运行参数
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");

    // 3. 根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let engine = build_engine(config);
    if let Err(e) = runtime.block_on(engine.run()) {
        error!("服务端退出：{}", e);
        process::exit(1);
    }
    info!("服务端已停止");
}

fn build_engine(config: Config) -> Engine {
    let mut engine = Engine::with_config(config);
    engine.add_middleware(vec![recovery(), logger(), cors()]);

    engine
        .get("/ping", chain![|c| {
            let body = format!("test  {}", c.query("name"));
            c.write(&body);
            Ok(())
        }])
        .get("/recover", chain![|_| -> Result<(), Exception> { panic!("recover测试") }])
        .post("/login", chain![|c| {
            let account = c.post_form("account").to_string();
            let password = c.post_form("password").to_string();
            c.json(200, &json!({ "account": account, "password": password }))
        }])
        .put("/put/test", chain![|c| c.json(200, &json!({ "msg": "put msg" }))])
        .delete("/delete/test", chain![|c| c.json(200, &json!({ "msg": "delete msg" }))]);
    engine
}
