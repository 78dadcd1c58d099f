//! 服务配置
//!
//! 配置来源按优先级叠加：配置文件 < `CLINIC_` 前缀环境变量 < 命令行参数。

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 监听主机
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 单个副作用钩子的超时（秒）
    #[serde(default = "default_hook_timeout_secs")]
    pub hook_timeout_secs: u64,
    /// 兜底挂号诊查费（未配置时进入诊室不开单）
    #[serde(default)]
    pub consultation_rate: Option<f64>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_hook_timeout_secs() -> u64 {
    3
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            hook_timeout_secs: default_hook_timeout_secs(),
            consultation_rate: None,
        }
    }
}

impl ServerSettings {
    /// 加载配置，文件路径可选
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("CLINIC"));

        let settings = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = ServerSettings::load(None).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.hook_timeout_secs, 3);
        assert!(settings.consultation_rate.is_none());
    }
}
