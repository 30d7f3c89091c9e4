//! 标注配置管理模块
//!
//! 支持配置文件（TOML/JSON）、环境变量和默认值三层来源

pub mod manager;

// 重新导出主要类型
pub use manager::{AnnotationConfig, ConfigManager, StartPolicy};

/// 配置常量
pub mod constants {
    // 展示开关
    pub const DEFAULT_SHOW_MORA_COUNT: bool = true;
    pub const DEFAULT_SHOW_VOWEL: bool = true;

    // 缓存设置
    pub const DEFAULT_CACHE_SIZE: usize = 1000;
    pub const MAX_CACHE_SIZE: usize = 1_000_000;

    // 并发设置
    pub const DEFAULT_MAX_CONCURRENT_CONVERSIONS: usize = 16;
    pub const MAX_CONCURRENT_CONVERSIONS: usize = 1024;
    // 行数少于该值时不值得交给 rayon
    pub const PARALLEL_MIN_LINES: usize = 32;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "jlyrics.toml",
        ".jlyrics.toml",
        "jlyrics.json",
        "~/.config/jlyrics/config.toml",
    ];

    // 依次尝试的 .env 文件，命中第一个即停止
    pub const ENV_FILES: &[&str] = &[".env.local", ".env"];
}

/// 是否存在任一默认位置的配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时退回默认值
pub fn load_config_or_default() -> AnnotationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.into_config(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            AnnotationConfig::default()
        }
    }
}
