//! Typed configuration, loaded from a TOML file. Nothing past this module
//! reads the file system for configuration again; this is the single
//! fallible boundary between "the user's settings" and the typed values the
//! rest of the crate works with.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConf {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    53
}

impl ServerConf {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::validation("server", e.to_string()))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvConf {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub set_edns0: bool,
    #[serde(default)]
    pub server_list_file: Option<String>,
    #[serde(default)]
    pub resolv_file: Option<String>,
}

fn default_timeout() -> u64 {
    5
}

fn default_interval() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConf {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_expire")]
    pub expire: u64,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_expire() -> u64 {
    600
}

fn default_max_count() -> usize {
    100_000
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct HostsConf {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub host_file: Option<String>,
    #[serde(default = "default_hosts_ttl")]
    pub ttl: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default)]
    pub redis_enable: bool,
    #[serde(default)]
    pub redis_key: Option<String>,
}

fn default_hosts_ttl() -> u32 {
    600
}

fn default_refresh_interval() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConf {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_redis_port() -> u16 {
    6379
}

impl RedisConf {
    pub fn url(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        match &self.password {
            Some(pass) => Some(format!("redis://:{}@{}:{}/{}", pass, host, self.port, self.db)),
            None => Some(format!("redis://{}:{}/{}", host, self.port, self.db)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConf {
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConf,
    #[serde(default)]
    pub resolv: ResolvConf,
    #[serde(default)]
    pub cache: CacheConf,
    #[serde(default)]
    pub hosts: HostsConf,
    #[serde(default)]
    pub redis: RedisConf,
    #[serde(default)]
    pub log: LogConf,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ResolvConf {
    fn default() -> Self {
        ResolvConf {
            timeout: default_timeout(),
            interval: default_interval(),
            set_edns0: false,
            server_list_file: None,
            resolv_file: None,
        }
    }
}

impl Default for CacheConf {
    fn default() -> Self {
        CacheConf {
            backend: default_cache_backend(),
            expire: default_expire(),
            max_count: default_max_count(),
        }
    }
}

impl Default for HostsConf {
    fn default() -> Self {
        HostsConf {
            enable: false,
            host_file: None,
            ttl: default_hosts_ttl(),
            refresh_interval: default_refresh_interval(),
            redis_enable: false,
            redis_key: None,
        }
    }
}

impl Default for LogConf {
    fn default() -> Self {
        LogConf {
            stdout: true,
            file: None,
            level: default_log_level(),
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io(path.display().to_string(), e.to_string()))?;
        let config: Config =
            toml::from_str(&text).map_err(|e| ConfigError::parse(path.display().to_string(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.backend == CacheBackend::Redis && self.redis.host.is_none() {
            return Err(ConfigError::validation(
                "redis.host",
                "cache.backend = \"redis\" requires [redis] host to be set",
            ));
        }
        if self.hosts.redis_enable && self.redis.host.is_none() {
            return Err(ConfigError::validation(
                "redis.host",
                "hosts.redis_enable requires [redis] host to be set",
            ));
        }
        Ok(())
    }

    pub fn host_file_path(&self) -> Option<PathBuf> {
        self.hosts.host_file.as_ref().map(PathBuf::from)
    }
}
