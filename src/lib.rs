//! # jlyrics
//!
//! 日语歌词的音韵标注库：为每一行计算莫拉数（用于对齐节奏）、行末母音（用于押韵）
//! 和完整的莫拉分解。
//!
//! ## 模块组织
//!
//! - `annotation` - 标注核心：文本规范化、莫拉切分、母音提取、读音引擎生命周期
//! - `env` - 类型安全的环境变量访问

pub mod annotation;
pub mod env;

// Re-export commonly used items for convenience
pub use annotation::{
    end_vowel, mora_count, normalize, segment, AnnotationConfig, AnnotationError,
    AnnotationResult, DocumentSession, EngineState, LineAnnotation, LineAnnotationPipeline,
    ReadingEngineLifecycle, VowelClass,
};
