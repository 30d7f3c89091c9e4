//! 读音引擎生命周期
//!
//! 这个模块把外部读音服务包装成一个显式持有、可共享的生命周期对象，负责：
//!
//! ## 主要功能
//! - **单飞初始化**: 无论多少调用方并发请求启动，外部服务的 `init` 最多执行一次
//! - **状态广播**: 通过 `tokio::sync::watch` 通道发布状态，订阅者能观察到单调前进的状态序列
//! - **失败降级**: 初始化失败后进入 `Failed`，不自动重试，标注退化为只计数原生假名
//! - **转换回退**: `convert` 内置回退逻辑，单次转换失败时返回原文，调用方无需特殊处理
//! - **结果缓存**: 可选的 LRU 缓存，只记忆成功的转换
//!
//! ## 状态机
//! ```text
//! Uninitialized ──ensure_started──▶ Initializing ──init成功──▶ Ready
//!                                          └──────init失败──▶ Failed
//! ```
//! 所有状态变更都经过同一个串行的比较并交换（`watch::Sender::send_if_modified`），
//! 不存在回退到先前状态的路径。
//!
//! ## 使用示例
//! ```rust,ignore
//! let lifecycle = Arc::new(ReadingEngineLifecycle::from_config(service, &config));
//! lifecycle.on_document_opened();
//! let state = lifecycle.wait_until_settled().await;
//! let reading = lifecycle.convert("明日").await;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;

use super::service::HealthLevel;
use crate::annotation::config::{AnnotationConfig, StartPolicy};
use crate::annotation::reading::{ConversionOptions, ReadingService};
use crate::annotation::storage::ConversionCache;

/// 读音引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl EngineState {
    /// 是否已经落定（成功或失败）
    pub fn is_settled(self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Failed)
    }

    pub fn is_ready(self) -> bool {
        self == EngineState::Ready
    }

    /// 状态在前进序列中的位置，用于校验单调性
    pub fn rank(self) -> u8 {
        match self {
            EngineState::Uninitialized => 0,
            EngineState::Initializing => 1,
            EngineState::Ready | EngineState::Failed => 2,
        }
    }
}

/// 需要告知用户的一次性事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// 开始加载词典
    Loading,
    /// 加载完成
    Loaded,
    /// 加载失败，附带原因
    Failed(String),
}

impl EngineEvent {
    /// 面向用户的提示文本
    pub fn message(&self) -> String {
        match self {
            EngineEvent::Loading => "jlyrics: 漢字辞書を読み込んでいます...".to_string(),
            EngineEvent::Loaded => "jlyrics: 漢字辞書の読み込みが完了しました".to_string(),
            EngineEvent::Failed(reason) => {
                format!("jlyrics: 漢字辞書の読み込みに失敗しました ({})", reason)
            }
        }
    }
}

/// 接收初始化结果通知的宿主端
pub trait EngineNotifier: Send + Sync {
    fn notify(&self, event: &EngineEvent);
}

/// 只写日志的默认通知器
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl EngineNotifier for TracingNotifier {
    fn notify(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Failed(_) => tracing::error!("{}", event.message()),
            _ => tracing::info!("{}", event.message()),
        }
    }
}

/// 生命周期统计
#[derive(Debug, Default)]
pub struct LifecycleStats {
    /// 实际触发的加载次数（单飞保证最多为1）
    pub loads_started: AtomicUsize,
    /// 调用外部服务的转换次数
    pub conversions: AtomicUsize,
    /// 转换失败并回退的次数
    pub conversion_failures: AtomicUsize,
    /// 缓存命中次数
    pub cache_hits: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStatsSnapshot {
    pub loads_started: usize,
    pub conversions: usize,
    pub conversion_failures: usize,
    pub cache_hits: usize,
}

impl LifecycleStats {
    pub fn snapshot(&self) -> LifecycleStatsSnapshot {
        LifecycleStatsSnapshot {
            loads_started: self.loads_started.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// 读音引擎生命周期
///
/// 持有外部读音服务和唯一的状态发送端。需要转换或查询就绪状态的组件
/// 通过 `Arc<ReadingEngineLifecycle>` 共享同一个实例。
///
/// ## 线程安全性
/// 状态保存在 `watch` 通道中，变更通过发送端内部的写锁串行化；
/// 统计信息使用原子计数；缓存内部自带互斥锁。整个结构体是 `Send + Sync` 的。
pub struct ReadingEngineLifecycle {
    service: Arc<dyn ReadingService>,
    state: watch::Sender<EngineState>,
    policy: StartPolicy,
    cache: Option<ConversionCache>,
    notifier: Arc<dyn EngineNotifier>,
    stats: LifecycleStats,
}

impl ReadingEngineLifecycle {
    /// 创建生命周期：惰性启动、不带缓存
    pub fn new(service: Arc<dyn ReadingService>) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            service,
            state,
            policy: StartPolicy::Lazy,
            cache: None,
            notifier: Arc::new(TracingNotifier),
            stats: LifecycleStats::default(),
        }
    }

    /// 按配置创建（启动策略与缓存）
    pub fn from_config(service: Arc<dyn ReadingService>, config: &AnnotationConfig) -> Self {
        Self::new(service)
            .with_policy(config.start_policy)
            .with_cache(ConversionCache::from_config(&config.cache_config()))
    }

    pub fn with_policy(mut self, policy: StartPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache(mut self, cache: Option<ConversionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn EngineNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// 当前状态
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn policy(&self) -> StartPolicy {
        self.policy
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> &LifecycleStats {
        &self.stats
    }

    pub fn cache(&self) -> Option<&ConversionCache> {
        self.cache.as_ref()
    }

    /// `Uninitialized → Initializing` 的唯一入口
    fn try_begin(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == EngineState::Uninitialized {
                *state = EngineState::Initializing;
                true
            } else {
                false
            }
        })
    }

    /// `Initializing → Ready|Failed`
    fn settle(&self, outcome: EngineState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == EngineState::Initializing && outcome.is_settled() {
                *state = outcome;
                true
            } else {
                false
            }
        })
    }

    /// 幂等地启动引擎
    ///
    /// 只有处于 `Uninitialized` 时才会在后台任务中开始加载；`Initializing`、`Ready`
    /// 或 `Failed` 时直接返回。返回值表示本次调用是否触发了加载。
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn ensure_started(self: &Arc<Self>) -> bool {
        if !self.try_begin() {
            return false;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_init().await;
        });
        true
    }

    /// 启动（若尚未启动）并等待结果落定
    ///
    /// 加载总是在后台任务中进行；等待方被取消时加载照常完成，状态不会停在 `Initializing`。
    pub async fn ensure_started_and_wait(self: &Arc<Self>) -> EngineState {
        self.ensure_started();
        self.wait_until_settled().await
    }

    /// 等待状态变为 `Ready` 或 `Failed`
    ///
    /// 没有任何调用方启动引擎时会一直等待下去。
    pub async fn wait_until_settled(&self) -> EngineState {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|state| state.is_settled())
            .await
            .map(|state| *state);
        settled.unwrap_or_else(|_| self.state())
    }

    /// 会话开始：只有急切策略才会启动
    pub fn on_session_start(self: &Arc<Self>) -> bool {
        match self.policy {
            StartPolicy::Eager => self.ensure_started(),
            StartPolicy::Lazy => false,
        }
    }

    /// 打开文档：两种策略都会启动（已启动时为空操作）
    pub fn on_document_opened(self: &Arc<Self>) -> bool {
        self.ensure_started()
    }

    async fn run_init(&self) {
        self.stats.loads_started.fetch_add(1, Ordering::Relaxed);
        self.notifier.notify(&EngineEvent::Loading);
        tracing::info!("开始初始化读音引擎: {}", self.service.name());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.service.init()).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                self.settle(EngineState::Ready);
                tracing::info!(
                    "读音引擎 {} 初始化完成，耗时 {:?}",
                    self.service.name(),
                    started.elapsed()
                );
                self.notifier.notify(&EngineEvent::Loaded);
            }
            Ok(Err(e)) => {
                self.settle(EngineState::Failed);
                tracing::error!("读音引擎初始化失败，进入降级模式: {}", e);
                self.notifier.notify(&EngineEvent::Failed(e.to_string()));
            }
            Err(_) => {
                self.settle(EngineState::Failed);
                tracing::error!("读音引擎初始化过程中发生 panic，进入降级模式");
                self.notifier
                    .notify(&EngineEvent::Failed("初始化过程中发生 panic".to_string()));
            }
        }
    }

    /// 把文本转换为平假名读音
    ///
    /// 未就绪时原样返回；单次转换失败时记录警告并原样返回。
    pub async fn convert(&self, text: &str) -> String {
        if text.is_empty() || !self.is_ready() {
            return text.to_string();
        }

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(text)) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }

        self.stats.conversions.fetch_add(1, Ordering::Relaxed);
        match self
            .service
            .convert(text, ConversionOptions::HIRAGANA_NORMAL)
            .await
        {
            Ok(converted) => {
                if let Some(cache) = &self.cache {
                    cache.insert(text, converted.clone());
                }
                converted
            }
            Err(e) => {
                self.stats.conversion_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("读音转换失败，使用原文: {}", e);
                text.to_string()
            }
        }
    }

    /// 健康级别：就绪为 `Healthy`，其余（加载中、失败、未启动）为 `Degraded`
    pub fn health(&self) -> HealthLevel {
        match self.state() {
            EngineState::Ready => HealthLevel::Healthy,
            _ => HealthLevel::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::error::{AnnotationError, AnnotationResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 把「明日」替换为「あした」的测试服务，含 `×` 的文本转换失败
    struct ReplaceService {
        fail_init: bool,
    }

    #[async_trait]
    impl ReadingService for ReplaceService {
        fn name(&self) -> &str {
            "test"
        }

        async fn init(&self) -> AnnotationResult<()> {
            if self.fail_init {
                Err(AnnotationError::EngineInitError("boom".to_string()))
            } else {
                Ok(())
            }
        }

        async fn convert(&self, text: &str, _options: ConversionOptions) -> AnnotationResult<String> {
            if text.contains('×') {
                return Err(AnnotationError::ConversionError("bad".to_string()));
            }
            Ok(text.replace("明日", "あした"))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<EngineEvent>>,
    }

    impl EngineNotifier for RecordingNotifier {
        fn notify(&self, event: &EngineEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn lifecycle(fail_init: bool) -> ReadingEngineLifecycle {
        ReadingEngineLifecycle::new(Arc::new(ReplaceService { fail_init }))
    }

    #[tokio::test]
    async fn test_convert_before_ready_returns_input() {
        let lifecycle = lifecycle(false);
        assert_eq!(lifecycle.state(), EngineState::Uninitialized);
        assert_eq!(lifecycle.convert("明日").await, "明日");
        assert_eq!(lifecycle.stats().snapshot().conversions, 0);
    }

    #[tokio::test]
    async fn test_ready_after_successful_init() {
        let lifecycle = Arc::new(lifecycle(false));
        assert_eq!(lifecycle.ensure_started_and_wait().await, EngineState::Ready);
        assert!(lifecycle.is_ready());
        assert_eq!(lifecycle.health(), HealthLevel::Healthy);
        assert_eq!(lifecycle.convert("明日も").await, "あしたも");
    }

    #[tokio::test]
    async fn test_failed_init_is_terminal() {
        let notifier = Arc::new(RecordingNotifier::default());
        let lifecycle = Arc::new(lifecycle(true).with_notifier(notifier.clone()));

        assert_eq!(lifecycle.ensure_started_and_wait().await, EngineState::Failed);
        // 再次请求启动不会重试
        assert_eq!(lifecycle.ensure_started_and_wait().await, EngineState::Failed);
        assert_eq!(lifecycle.stats().snapshot().loads_started, 1);
        assert_eq!(lifecycle.health(), HealthLevel::Degraded);
        assert_eq!(lifecycle.convert("明日").await, "明日");

        let events = notifier.events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], EngineEvent::Loading);
        assert!(matches!(events[1], EngineEvent::Failed(_)));
    }

    #[tokio::test]
    async fn test_conversion_error_falls_back() {
        let lifecycle = Arc::new(lifecycle(false));
        lifecycle.ensure_started_and_wait().await;

        assert_eq!(lifecycle.convert("明日×").await, "明日×");
        let stats = lifecycle.stats().snapshot();
        assert_eq!(stats.conversions, 1);
        assert_eq!(stats.conversion_failures, 1);
    }

    #[tokio::test]
    async fn test_cache_only_keeps_successes() {
        let lifecycle = Arc::new(lifecycle(false).with_cache(Some(ConversionCache::new(8))));
        lifecycle.ensure_started_and_wait().await;

        assert_eq!(lifecycle.convert("明日").await, "あした");
        assert_eq!(lifecycle.convert("明日").await, "あした");
        lifecycle.convert("明日×").await;

        let stats = lifecycle.stats().snapshot();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.conversions, 2);
        assert_eq!(lifecycle.cache().map(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn test_lazy_policy_ignores_session_start() {
        let lifecycle = Arc::new(lifecycle(false));
        assert!(!lifecycle.on_session_start());
        assert_eq!(lifecycle.state(), EngineState::Uninitialized);

        assert!(lifecycle.on_document_opened());
        assert!(!lifecycle.on_document_opened());
        assert_eq!(lifecycle.wait_until_settled().await, EngineState::Ready);
    }

    #[tokio::test]
    async fn test_eager_policy_starts_on_session() {
        let lifecycle = Arc::new(lifecycle(false).with_policy(StartPolicy::Eager));
        assert!(lifecycle.on_session_start());
        assert_eq!(lifecycle.wait_until_settled().await, EngineState::Ready);
    }

    #[test]
    fn test_state_rank_is_monotonic_order() {
        assert!(EngineState::Uninitialized.rank() < EngineState::Initializing.rank());
        assert!(EngineState::Initializing.rank() < EngineState::Ready.rank());
        assert_eq!(EngineState::Ready.rank(), EngineState::Failed.rank());
        assert!(!EngineState::Initializing.is_settled());
    }
}
