use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::time::Duration;

use crate::param::{DEFAULT_MAX_FORM_SIZE, DEFAULT_MAX_MULTIPART_MEMORY};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    port: u16,
    local: bool,
    worker_threads: usize,
    #[serde(default = "default_pool_capacity")]
    pool_capacity: usize,
    #[serde(default = "default_timeout_secs")]
    read_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    write_timeout_secs: u64,
    #[serde(default = "default_max_body_size")]
    max_body_size: usize,
    #[serde(default = "default_max_form_size")]
    max_form_size: usize,
    #[serde(default = "default_max_multipart_memory")]
    max_multipart_memory: usize,
}

fn default_pool_capacity() -> usize {
    1024
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_body_size() -> usize {
    default_max_multipart_memory() + (1 << 20)
}

fn default_max_form_size() -> usize {
    DEFAULT_MAX_FORM_SIZE
}

fn default_max_multipart_memory() -> usize {
    DEFAULT_MAX_MULTIPART_MEMORY
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 8080,
            local: false,
            worker_threads: num_cpus::get(),
            pool_capacity: default_pool_capacity(),
            read_timeout_secs: default_timeout_secs(),
            write_timeout_secs: default_timeout_secs(),
            max_body_size: default_max_body_size(),
            max_form_size: default_max_form_size(),
            max_multipart_memory: default_max_multipart_memory(),
        }
    }

    /// 从 TOML 文件加载配置。文件缺失或格式错误时使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let mut str_val = String::new();
        let read = File::open(filename).and_then(|mut file| file.read_to_string(&mut str_val));
        if let Err(e) = read {
            warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
            return Config::new();
        }
        Self::from_toml_str(&str_val)
    }

    /// 从 TOML 字符串构建配置
    pub fn from_toml_str(str_val: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.pool_capacity == 0 {
            warn!("pool_capacity被设置为0，上下文池至少需要一个槽位，因此该值将被改为1。");
            raw_config.pool_capacity = 1;
        }
        if raw_config.max_body_size < raw_config.max_multipart_memory {
            warn!("max_body_size小于max_multipart_memory，multipart上限实际受max_body_size约束");
        }
        raw_config
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity.max(1);
        self
    }

    pub fn with_max_multipart_memory(mut self, bytes: usize) -> Self {
        self.max_multipart_memory = bytes;
        self
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn max_form_size(&self) -> usize {
        self.max_form_size
    }

    pub fn max_multipart_memory(&self) -> usize {
        self.max_multipart_memory
    }
}
