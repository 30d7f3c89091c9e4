//! 核心模块：读音引擎生命周期、行标注管道与文档会话

pub mod lifecycle;
pub mod service;
pub mod session;

pub use lifecycle::{
    EngineEvent, EngineNotifier, EngineState, LifecycleStats, LifecycleStatsSnapshot,
    ReadingEngineLifecycle, TracingNotifier,
};
pub use service::{
    HealthLevel, HealthStatus, LineAnnotation, LineAnnotationPipeline, PipelineOptions,
    PipelineStats, PipelineStatsSnapshot,
};
pub use session::{
    AnnotationSink, AnnotationUpdate, ChannelSink, DocumentSession, NullSink, SessionStats,
    SessionStatsSnapshot,
};

pub use crate::annotation::config::StartPolicy;
