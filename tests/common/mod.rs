// 集成测试公共模块
//
// 提供可编排的读音服务、通知记录器和测试环境构建器

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use jlyrics::annotation::{
    AnnotationConfig, AnnotationError, AnnotationResult, AnnotationUpdate, ChannelSink,
    ConversionOptions, ConversionCache, DocumentSession, EngineEvent, EngineNotifier,
    LineAnnotationPipeline, PipelineOptions, ReadingEngineLifecycle, ReadingService, StartPolicy,
};

/// 含有该字符的文本转换失败
pub const FAILURE_MARKER: char = '×';
/// 含有该字符的文本转换前等待 `SLOW_DELAY`
pub const SLOW_MARKER: char = '遅';
pub const SLOW_DELAY: Duration = Duration::from_millis(200);

/// 可编排的读音服务
///
/// 按词表做子串替换；可以让初始化失败、panic，或者阻塞到 `release` 被调用。
pub struct MockReadingService {
    readings: HashMap<String, String>,
    fail_init: bool,
    panic_on_init: bool,
    gate: Option<Arc<Notify>>,
    init_calls: AtomicUsize,
    convert_calls: AtomicUsize,
}

impl MockReadingService {
    pub fn new() -> Self {
        let readings = [
            ("明日", "あした"),
            ("空", "そら"),
            ("花", "はな"),
            ("夢", "ゆめ"),
            ("君", "きみ"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            readings,
            fail_init: false,
            panic_on_init: false,
            gate: None,
            init_calls: AtomicUsize::new(0),
            convert_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_init: true,
            ..Self::new()
        }
    }

    /// 初始化会一直等待，直到返回的 `Notify` 被通知
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let service = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (service, gate)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn convert_calls(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockReadingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingService for MockReadingService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn init(&self) -> AnnotationResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.panic_on_init {
            panic!("mock init panicked");
        }
        if self.fail_init {
            return Err(AnnotationError::EngineInitError(
                "dictionary not found".to_string(),
            ));
        }
        Ok(())
    }

    async fn convert(&self, text: &str, _options: ConversionOptions) -> AnnotationResult<String> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(SLOW_MARKER) {
            tokio::time::sleep(SLOW_DELAY).await;
        }
        if text.contains(FAILURE_MARKER) {
            return Err(AnnotationError::ConversionError(format!(
                "cannot convert {}",
                text
            )));
        }
        let mut converted = text.to_string();
        for (surface, reading) in &self.readings {
            converted = converted.replace(surface.as_str(), reading);
        }
        Ok(converted)
    }
}

/// 记录所有生命周期事件
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, EngineEvent::Failed(_)))
            .count()
    }
}

impl EngineNotifier for RecordingNotifier {
    fn notify(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// 测试环境构建器
pub struct TestEnvironmentBuilder {
    service: Option<MockReadingService>,
    config: AnnotationConfig,
    with_cache: bool,
}

impl TestEnvironmentBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            config: AnnotationConfig::default(),
            with_cache: false,
        }
    }

    pub fn with_service(mut self, service: MockReadingService) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_policy(mut self, policy: StartPolicy) -> Self {
        self.config.start_policy = policy;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.with_cache = true;
        self
    }

    pub fn with_parallelism(mut self, parallel_enabled: bool, max_concurrent: usize) -> Self {
        self.config.parallel_enabled = parallel_enabled;
        self.config.max_concurrent_conversions = max_concurrent;
        self
    }

    pub fn build(self) -> TestEnvironment {
        let service = Arc::new(self.service.unwrap_or_default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = self.with_cache.then(|| ConversionCache::new(64));

        let lifecycle = Arc::new(
            ReadingEngineLifecycle::new(service.clone())
                .with_policy(self.config.start_policy)
                .with_cache(cache)
                .with_notifier(notifier.clone()),
        );
        let pipeline = Arc::new(LineAnnotationPipeline::new(
            Arc::clone(&lifecycle),
            PipelineOptions::from(&self.config),
        ));

        TestEnvironment {
            service,
            notifier,
            lifecycle,
            pipeline,
            config: self.config,
        }
    }
}

impl Default for TestEnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub service: Arc<MockReadingService>,
    pub notifier: Arc<RecordingNotifier>,
    pub lifecycle: Arc<ReadingEngineLifecycle>,
    pub pipeline: Arc<LineAnnotationPipeline>,
    pub config: AnnotationConfig,
}

impl TestEnvironment {
    /// 在当前环境上开启一个文档会话
    pub fn start_session(&self) -> (Arc<DocumentSession>, mpsc::UnboundedReceiver<AnnotationUpdate>) {
        let (sink, receiver) = ChannelSink::new();
        let session = DocumentSession::start(
            Arc::clone(&self.pipeline),
            self.config.clone(),
            Arc::new(sink),
        );
        (session, receiver)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        TestEnvironmentBuilder::new().build()
    }
}

/// 等待后台任务推进
pub async fn settle_background_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// 取出通道中已有的全部更新
pub fn drain_updates(receiver: &mut mpsc::UnboundedReceiver<AnnotationUpdate>) -> Vec<AnnotationUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = receiver.try_recv() {
        updates.push(update);
    }
    updates
}
