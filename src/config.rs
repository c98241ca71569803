use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 未指定 --config 时，在输入文件同目录下查找的配置文件名
pub const CONFIG_FILE_NAME: &str = "furai.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FuraiConfig {
    #[serde(default)]
    pub compile: CompileConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileConfig {
    /// slot 被调用方内容填充后仍输出其默认内容
    #[serde(default)]
    pub keep_slot_default: bool,
    /// 帧等待的结束标签缺失时报错，而不是静默结束
    #[serde(default = "default_true")]
    pub strict_termination: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl FuraiConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("读取 {} 失败：{}", path.display(), e))?;
        let config: FuraiConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析 {} 失败：{}", path.display(), e))?;
        Ok(config)
    }

    /// 显式指定的配置文件必须存在；否则尝试输入文件旁的 furai.toml，都没有则用默认值
    pub fn discover(explicit: Option<&Path>, input: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let sibling = match input.parent() {
            Some(dir) => dir.join(CONFIG_FILE_NAME),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };
        if sibling.is_file() {
            return Ok((Self::load(&sibling)?, Some(sibling)));
        }
        Ok((Self::default(), None))
    }
}

// 默认值函数
fn default_true() -> bool { true }
fn default_log_level() -> String { "warn".into() }

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            keep_slot_default: false,
            strict_termination: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
