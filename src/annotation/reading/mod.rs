//! 外部读音转换服务接口
//!
//! 读音引擎（汉字 → 假名的形态素分析器）本身是第三方依赖，这里只定义它的契约：
//!
//! - `init()`：一次性、可能很慢的初始化（例如加载词典）
//! - `convert(text, options)`：把文本转换为假名读音
//!
//! 生命周期管理、失败回退和缓存都由 [`ReadingEngineLifecycle`](crate::annotation::core::ReadingEngineLifecycle)
//! 负责，实现方只需如实报告成功或失败。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::annotation::error::{AnnotationError, AnnotationResult};

#[cfg(feature = "vibrato")]
pub mod vibrato;

#[cfg(feature = "vibrato")]
pub use self::vibrato::VibratoReadingService;

/// 转换目标文字
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingTarget {
    #[default]
    Hiragana,
    Katakana,
}

/// 转换模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// 直接拼接各词的读音
    #[default]
    Normal,
    /// 词与词之间插入空格
    Spaced,
}

/// 转换选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub target: ReadingTarget,
    pub mode: ConversionMode,
}

impl ConversionOptions {
    /// 标注管道使用的选项：平假名、普通模式
    pub const HIRAGANA_NORMAL: ConversionOptions = ConversionOptions {
        target: ReadingTarget::Hiragana,
        mode: ConversionMode::Normal,
    };
}

/// 读音转换服务
#[async_trait]
pub trait ReadingService: Send + Sync {
    /// 服务名称，用于日志
    fn name(&self) -> &str;

    /// 一次性初始化
    ///
    /// 由生命周期保证最多调用一次；失败不会被重试。
    async fn init(&self) -> AnnotationResult<()>;

    /// 转换文本
    ///
    /// 只会在 `init` 成功之后被调用。
    async fn convert(&self, text: &str, options: ConversionOptions) -> AnnotationResult<String>;
}

/// 未配置读音引擎时使用的占位实现
///
/// `init` 总是失败，使系统进入降级模式（只计数原生假名）。
#[derive(Debug, Default, Clone)]
pub struct DisabledReadingService {
    reason: String,
}

impl DisabledReadingService {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReadingService for DisabledReadingService {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn init(&self) -> AnnotationResult<()> {
        let reason = if self.reason.is_empty() {
            "未配置读音引擎"
        } else {
            self.reason.as_str()
        };
        Err(AnnotationError::EngineInitError(reason.to_string()))
    }

    async fn convert(&self, _text: &str, _options: ConversionOptions) -> AnnotationResult<String> {
        Err(AnnotationError::EngineNotReady)
    }
}

/// 根据配置构建读音服务
///
/// 启用 `vibrato` 特性且配置了词典路径时返回 vibrato 适配器，否则返回占位实现。
pub fn build_reading_service(
    dictionary_path: Option<&std::path::Path>,
) -> std::sync::Arc<dyn ReadingService> {
    match dictionary_path {
        #[cfg(feature = "vibrato")]
        Some(path) => std::sync::Arc::new(VibratoReadingService::new(path)),
        #[cfg(not(feature = "vibrato"))]
        Some(path) => std::sync::Arc::new(DisabledReadingService::new(format!(
            "未启用 vibrato 特性，无法加载词典 {}",
            path.display()
        ))),
        None => std::sync::Arc::new(DisabledReadingService::new("未配置词典路径")),
    }
}
