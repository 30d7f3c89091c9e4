//! 歌词标注模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//! 注意：`convert` / `annotate` 系列接口从不返回错误，所有失败都在最小范围内被吸收；
//! 这里的错误类型只在配置加载、读音引擎构建和CLI I/O处暴露。

use std::fmt;

use thiserror::Error;

/// 标注错误类型
#[derive(Error, Debug, Clone)]
pub enum AnnotationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 读音引擎初始化失败（词典加载失败等）
    #[error("读音引擎初始化失败: {0}")]
    EngineInitError(String),

    /// 单次读音转换失败
    #[error("读音转换失败: {0}")]
    ConversionError(String),

    /// 读音引擎尚未就绪
    #[error("读音引擎尚未就绪")]
    EngineNotReady,

    /// 词典错误
    #[error("词典错误: {0}")]
    DictionaryError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),
}

impl AnnotationError {
    /// 该错误是否会让系统进入降级模式（仅计数假名）
    pub fn is_degrading(&self) -> bool {
        matches!(
            self,
            AnnotationError::EngineInitError(_) | AnnotationError::DictionaryError(_)
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnnotationError::ConfigError(_) => ErrorSeverity::Critical,
            AnnotationError::EngineInitError(_) => ErrorSeverity::Error,
            AnnotationError::ConversionError(_) => ErrorSeverity::Warning,
            AnnotationError::EngineNotReady => ErrorSeverity::Info,
            AnnotationError::DictionaryError(_) => ErrorSeverity::Error,
            AnnotationError::IoError(_) => ErrorSeverity::Error,
            AnnotationError::ParseError(_) => ErrorSeverity::Error,
            AnnotationError::SerializationError(_) => ErrorSeverity::Error,
            AnnotationError::ConcurrencyError(_) => ErrorSeverity::Warning,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnnotationError::ConfigError(_) => ErrorCategory::Configuration,
            AnnotationError::EngineInitError(_) => ErrorCategory::Engine,
            AnnotationError::ConversionError(_) => ErrorCategory::Engine,
            AnnotationError::EngineNotReady => ErrorCategory::Engine,
            AnnotationError::DictionaryError(_) => ErrorCategory::Engine,
            AnnotationError::IoError(_) => ErrorCategory::Io,
            AnnotationError::ParseError(_) => ErrorCategory::Parsing,
            AnnotationError::SerializationError(_) => ErrorCategory::Serialization,
            AnnotationError::ConcurrencyError(_) => ErrorCategory::Concurrency,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let current_msg = self.to_string();
        let new_msg = format!("{} (上下文: {})", current_msg, context);

        match &mut self {
            AnnotationError::ConfigError(ref mut msg) => *msg = new_msg,
            AnnotationError::EngineInitError(ref mut msg) => *msg = new_msg,
            AnnotationError::ConversionError(ref mut msg) => *msg = new_msg,
            AnnotationError::DictionaryError(ref mut msg) => *msg = new_msg,
            AnnotationError::IoError(ref mut msg) => *msg = new_msg,
            AnnotationError::ParseError(ref mut msg) => *msg = new_msg,
            AnnotationError::SerializationError(ref mut msg) => *msg = new_msg,
            AnnotationError::ConcurrencyError(ref mut msg) => *msg = new_msg,
            AnnotationError::EngineNotReady => {
                return AnnotationError::EngineNotReady;
            }
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Engine,
    Io,
    Parsing,
    Serialization,
    Concurrency,
}

/// 标准错误转换
impl From<std::io::Error> for AnnotationError {
    fn from(error: std::io::Error) -> Self {
        AnnotationError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for AnnotationError {
    fn from(error: serde_json::Error) -> Self {
        AnnotationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for AnnotationError {
    fn from(error: toml::de::Error) -> Self {
        AnnotationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for AnnotationError {
    fn from(error: toml::ser::Error) -> Self {
        AnnotationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::task::JoinError> for AnnotationError {
    fn from(error: tokio::task::JoinError) -> Self {
        AnnotationError::ConcurrencyError(format!("后台任务失败: {}", error))
    }
}

/// 错误结果类型别名
pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 记录并返回错误
    pub fn log_error<T>(error: AnnotationError) -> AnnotationResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("标注信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("标注警告: {}", error),
            ErrorSeverity::Error => tracing::error!("标注错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("标注严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> AnnotationError {
        AnnotationError::ConfigError(msg.to_string())
    }

    /// 创建引擎初始化错误
    pub fn engine_init_error<T: fmt::Display>(msg: T) -> AnnotationError {
        AnnotationError::EngineInitError(msg.to_string())
    }

    /// 创建转换错误
    pub fn conversion_error<T: fmt::Display>(msg: T) -> AnnotationError {
        AnnotationError::ConversionError(msg.to_string())
    }
}
