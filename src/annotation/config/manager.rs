//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::annotation::error::{AnnotationError, AnnotationResult};
use crate::annotation::storage::CacheConfig;

/// 读音引擎启动策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPolicy {
    /// 会话创建时立即加载
    Eager,
    /// 打开第一个文档时才加载
    #[default]
    Lazy,
}

impl StartPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StartPolicy::Eager => "eager",
            StartPolicy::Lazy => "lazy",
        }
    }
}

impl fmt::Display for StartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartPolicy {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eager" => Ok(StartPolicy::Eager),
            "lazy" => Ok(StartPolicy::Lazy),
            other => Err(AnnotationError::ParseError(format!(
                "未知的启动策略 '{}'，可选值: eager, lazy",
                other
            ))),
        }
    }
}

/// 标注配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnnotationConfig {
    // 展示开关
    pub show_mora_count: bool,
    pub show_vowel: bool,

    // 读音引擎
    pub start_policy: StartPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_path: Option<PathBuf>,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_size: usize,

    // 性能配置
    pub parallel_enabled: bool,
    pub max_concurrent_conversions: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            show_mora_count: constants::DEFAULT_SHOW_MORA_COUNT,
            show_vowel: constants::DEFAULT_SHOW_VOWEL,

            start_policy: StartPolicy::default(),
            dictionary_path: None,

            cache_enabled: true,
            cache_size: constants::DEFAULT_CACHE_SIZE,

            parallel_enabled: true,
            max_concurrent_conversions: constants::DEFAULT_MAX_CONCURRENT_CONVERSIONS,
        }
    }
}

impl AnnotationConfig {
    /// 两个展示开关都关闭时无需计算
    pub fn should_compute(&self) -> bool {
        self.show_mora_count || self.show_vowel
    }

    /// 验证配置
    pub fn validate(&self) -> AnnotationResult<()> {
        if self.cache_enabled && self.cache_size == 0 {
            return Err(AnnotationError::ConfigError(
                "启用缓存时缓存大小不能为0".to_string(),
            ));
        }

        if self.cache_size > constants::MAX_CACHE_SIZE {
            return Err(AnnotationError::ConfigError(format!(
                "缓存大小 {} 超过上限 {}",
                self.cache_size,
                constants::MAX_CACHE_SIZE
            )));
        }

        if self.max_concurrent_conversions == 0 {
            return Err(AnnotationError::ConfigError(
                "最大并发转换数不能为0".to_string(),
            ));
        }

        if self.max_concurrent_conversions > constants::MAX_CONCURRENT_CONVERSIONS {
            return Err(AnnotationError::ConfigError(format!(
                "最大并发转换数 {} 超过上限 {}",
                self.max_concurrent_conversions,
                constants::MAX_CONCURRENT_CONVERSIONS
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    ///
    /// 只有实际设置了的变量才会覆盖；无法解析的值记录警告后忽略。
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, display, engine, performance, EnvVar};

        fn take<T>(result: Option<crate::env::EnvResult<T>>) -> Option<T> {
            match result? {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("忽略无效的环境变量: {}", e);
                    None
                }
            }
        }

        if let Some(show) = take(display::ShowMoraCount::get_if_set()) {
            self.show_mora_count = show;
        }

        if let Some(show) = take(display::ShowVowel::get_if_set()) {
            self.show_vowel = show;
        }

        if let Some(policy) = take(engine::StartPolicyVar::get_if_set()) {
            self.start_policy = policy;
        }

        if let Some(path) = take(engine::DictionaryPath::get_if_set()) {
            tracing::info!("环境变量覆盖词典路径: {}", path.display());
            self.dictionary_path = Some(path);
        }

        if let Some(enabled) = take(cache::Enabled::get_if_set()) {
            self.cache_enabled = enabled;
        }

        if let Some(size) = take(cache::Size::get_if_set()) {
            self.cache_size = size;
        }

        if let Some(enabled) = take(performance::ParallelEnabled::get_if_set()) {
            self.parallel_enabled = enabled;
        }

        if let Some(max) = take(performance::MaxConcurrentConversions::get_if_set()) {
            self.max_concurrent_conversions = max;
        }
    }

    /// 缓存配置视图
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.cache_enabled,
            capacity: self.cache_size,
        }
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: AnnotationConfig,
}

impl ConfigManager {
    /// 按默认搜索路径加载配置
    pub fn new() -> AnnotationResult<Self> {
        Self::load_dotenv();

        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件加载配置（环境变量仍然生效）
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnnotationResult<Self> {
        Self::load_dotenv();

        let mut config = Self::load_from_file(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &AnnotationConfig {
        &self.config
    }

    pub fn into_config(self) -> AnnotationConfig {
        self.config
    }

    fn load_config() -> AnnotationResult<AnnotationConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(AnnotationConfig::default())
    }

    fn load_from_file(path: &Path) -> AnnotationResult<AnnotationConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnnotationError::ConfigError(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| AnnotationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| AnnotationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> AnnotationResult<()> {
        let config = AnnotationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| AnnotationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| AnnotationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
