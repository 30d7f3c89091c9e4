//! 歌词标注模块
//!
//! 为日语歌词的每一行计算莫拉数、行末母音与莫拉分解，模块划分如下：
//! - **pipeline**: 纯同步的文本处理（规范化、莫拉切分、母音提取）
//! - **reading**: 外部读音转换服务的接口与适配
//! - **core**: 读音引擎生命周期、行标注管道、文档会话
//! - **storage**: 转换结果缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jlyrics::annotation::{
//!     build_reading_service, AnnotationConfig, LineAnnotationPipeline, ReadingEngineLifecycle,
//! };
//!
//! # async fn example() {
//! let config = AnnotationConfig::default();
//! let service = build_reading_service(config.dictionary_path.as_deref());
//! let lifecycle = Arc::new(ReadingEngineLifecycle::from_config(service, &config));
//! lifecycle.ensure_started_and_wait().await;
//!
//! let pipeline = LineAnnotationPipeline::from_config(lifecycle, &config);
//! let annotation = pipeline.annotate("明日(あした)へ").await;
//! assert_eq!(annotation.mora_count, 4);
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块 - 生命周期、标注管道、文档会话
pub mod core;

/// 错误处理模块
pub mod error;

/// 文本处理管道模块
///
/// 规范化、莫拉切分和行末母音提取，全部是纯函数
pub mod pipeline;

/// 外部读音服务接口
pub mod reading;

/// 存储模块 - 转换结果缓存
pub mod storage;

// ============================================================================
// 公共接口重新导出
// ============================================================================

pub use config::{AnnotationConfig, ConfigManager, StartPolicy};
pub use self::core::{
    AnnotationSink, AnnotationUpdate, ChannelSink, DocumentSession, EngineEvent, EngineNotifier,
    EngineState, HealthLevel, HealthStatus, LineAnnotation, LineAnnotationPipeline, NullSink,
    PipelineOptions, ReadingEngineLifecycle, TracingNotifier,
};
pub use error::{AnnotationError, AnnotationResult};
pub use pipeline::{MoraSegmenter, RubyOverride, TextNormalizer, VowelClass, VowelExtractor};
pub use reading::{
    build_reading_service, ConversionMode, ConversionOptions, DisabledReadingService,
    ReadingService, ReadingTarget,
};
pub use storage::ConversionCache;

/// 规范化一行歌词
pub fn normalize(line: &str) -> String {
    pipeline::normalizer::normalize(line)
}

/// 切分莫拉
pub fn segment(text: &str) -> Vec<String> {
    pipeline::segmenter::segment(text)
}

/// 莫拉数
pub fn mora_count(text: &str) -> usize {
    MoraSegmenter.count(text)
}

/// 行末母音
pub fn end_vowel(text: &str) -> Option<VowelClass> {
    pipeline::vowel::end_vowel(text)
}
