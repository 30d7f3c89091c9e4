//! 文档会话
//!
//! 宿主一侧的协作者：持有打开的文档，把编辑器事件（打开、修改、切换、配置变更、关闭）
//! 转换为对 [`LineAnnotationPipeline`] 的重新计算，并把结果交给 [`AnnotationSink`]。
//!
//! 每个文档带一个修订号，每次请求计算都会从会话级计数器领取新值，关闭后重新打开也不会
//! 回退。计算完成时只有修订号仍然是最新的结果才会被采用（按文档粒度的后写优先），
//! 文档已关闭时结果直接丢弃。
//!
//! 读音引擎就绪时，后台任务会把所有打开的文档重新标注一次。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::lifecycle::EngineState;
use super::service::{LineAnnotation, LineAnnotationPipeline};
use crate::annotation::config::AnnotationConfig;

/// 推送给渲染层的更新
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationUpdate {
    /// 文档的最新标注
    Annotated {
        document: String,
        revision: u64,
        annotations: Arc<Vec<LineAnnotation>>,
    },
    /// 清除文档上的全部标注（关闭或停止显示）
    Cleared { document: String },
}

impl AnnotationUpdate {
    pub fn document(&self) -> &str {
        match self {
            AnnotationUpdate::Annotated { document, .. } => document,
            AnnotationUpdate::Cleared { document } => document,
        }
    }
}

/// 标注结果的接收端
///
/// 回调在会话内部的任务上同步执行，不应阻塞。同一文档的更新可能乱序到达，
/// 需要时以 `revision` 判断新旧。
pub trait AnnotationSink: Send + Sync {
    fn publish(&self, update: AnnotationUpdate);
}

/// 丢弃一切更新
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AnnotationSink for NullSink {
    fn publish(&self, _update: AnnotationUpdate) {}
}

/// 把更新转发到 tokio 通道
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<AnnotationUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnnotationUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AnnotationSink for ChannelSink {
    fn publish(&self, update: AnnotationUpdate) {
        if self.sender.send(update).is_err() {
            tracing::debug!("标注接收端已关闭，丢弃更新");
        }
    }
}

/// 会话统计
#[derive(Debug, Default)]
pub struct SessionStats {
    pub computations: AtomicUsize,
    pub stale_results_dropped: AtomicUsize,
    pub readiness_refreshes: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub computations: usize,
    pub stale_results_dropped: usize,
    pub readiness_refreshes: usize,
}

impl SessionStats {
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            computations: self.computations.load(Ordering::Relaxed),
            stale_results_dropped: self.stale_results_dropped.load(Ordering::Relaxed),
            readiness_refreshes: self.readiness_refreshes.load(Ordering::Relaxed),
        }
    }
}

struct DocumentEntry {
    lines: Vec<String>,
    revision: u64,
    annotations: Option<Arc<Vec<LineAnnotation>>>,
}

impl DocumentEntry {
    fn new(text: &str) -> Self {
        Self {
            lines: split_lines(text),
            revision: 0,
            annotations: None,
        }
    }
}

/// 按 `\n` 切分并去掉行尾 `\r`；末尾换行产生的空行会保留，与编辑器的行数一致
fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// 文档会话
pub struct DocumentSession {
    pipeline: Arc<LineAnnotationPipeline>,
    config: RwLock<AnnotationConfig>,
    documents: DashMap<String, DocumentEntry>,
    revisions: AtomicU64,
    active: RwLock<Option<String>>,
    sink: Arc<dyn AnnotationSink>,
    readiness_task: Mutex<Option<JoinHandle<()>>>,
    stats: SessionStats,
}

impl DocumentSession {
    /// 创建会话并启动就绪监听任务
    ///
    /// 急切策略下同时开始加载读音引擎。必须在 tokio 运行时中调用。
    pub fn start(
        pipeline: Arc<LineAnnotationPipeline>,
        config: AnnotationConfig,
        sink: Arc<dyn AnnotationSink>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            pipeline,
            config: RwLock::new(config),
            documents: DashMap::new(),
            revisions: AtomicU64::new(0),
            active: RwLock::new(None),
            sink,
            readiness_task: Mutex::new(None),
            stats: SessionStats::default(),
        });

        session.spawn_readiness_watcher();
        session.pipeline.lifecycle().on_session_start();
        session
    }

    fn spawn_readiness_watcher(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut receiver = self.pipeline.lifecycle().subscribe();

        let handle = tokio::spawn(async move {
            let settled = receiver
                .wait_for(|state| state.is_settled())
                .await
                .map(|state| *state);

            match settled {
                Ok(EngineState::Ready) => {
                    let Some(session) = weak.upgrade() else {
                        return;
                    };
                    session
                        .stats
                        .readiness_refreshes
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        "读音引擎就绪，重新标注 {} 个打开的文档",
                        session.documents.len()
                    );
                    session.refresh_all().await;
                }
                Ok(_) => tracing::info!("读音引擎不可用，继续使用仅假名的标注"),
                Err(_) => tracing::debug!("读音引擎状态通道已关闭"),
            }
        });

        *self
            .readiness_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    pub fn pipeline(&self) -> &Arc<LineAnnotationPipeline> {
        &self.pipeline
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// 当前配置的副本
    pub fn config(&self) -> AnnotationConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn active_document(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_open(&self, document: &str) -> bool {
        self.documents.contains_key(document)
    }

    pub fn open_documents(&self) -> Vec<String> {
        self.documents.iter().map(|entry| entry.key().clone()).collect()
    }

    /// 最近一次采用的标注
    pub fn annotations(&self, document: &str) -> Option<Arc<Vec<LineAnnotation>>> {
        self.documents
            .get(document)
            .and_then(|entry| entry.annotations.clone())
    }

    /// 打开文档：登记文本、按需启动读音引擎并立即标注
    pub async fn open_document(&self, document: &str, text: &str) -> Option<Arc<Vec<LineAnnotation>>> {
        self.documents
            .entry(document.to_string())
            .and_modify(|entry| entry.lines = split_lines(text))
            .or_insert_with(|| DocumentEntry::new(text));
        self.pipeline.lifecycle().on_document_opened();
        self.recompute(document).await
    }

    /// 全文变更
    ///
    /// 未打开的文档会被当作新打开的文档处理。
    pub async fn change_text(&self, document: &str, text: &str) -> Option<Arc<Vec<LineAnnotation>>> {
        let known = match self.documents.get_mut(document) {
            Some(mut entry) => {
                entry.lines = split_lines(text);
                true
            }
            None => false,
        };

        if !known {
            return self.open_document(document, text).await;
        }
        self.recompute(document).await
    }

    /// 切换活动文档
    pub async fn set_active_document(&self, document: &str) -> Option<Arc<Vec<LineAnnotation>>> {
        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(document.to_string());
        self.recompute(document).await
    }

    /// 配置变更
    ///
    /// 两个展示开关都关闭时清除所有标注；否则重新标注所有打开的文档。
    pub async fn update_configuration(&self, config: AnnotationConfig) {
        let should_compute = config.should_compute();
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;

        if should_compute {
            self.refresh_all().await;
            return;
        }

        for mut entry in self.documents.iter_mut() {
            // 让进行中的计算失效
            entry.revision = self.next_revision();
            entry.annotations = None;
        }
        for document in self.open_documents() {
            self.sink.publish(AnnotationUpdate::Cleared { document });
        }
    }

    /// 关闭文档；尚未完成的计算结果会被丢弃
    pub fn close_document(&self, document: &str) -> bool {
        let removed = self.documents.remove(document).is_some();
        if removed {
            let mut active = self
                .active
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if active.as_deref() == Some(document) {
                *active = None;
            }
            drop(active);
            self.sink.publish(AnnotationUpdate::Cleared {
                document: document.to_string(),
            });
        }
        removed
    }

    fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 重新标注所有打开的文档
    pub async fn refresh_all(&self) {
        for document in self.open_documents() {
            self.recompute(&document).await;
        }
    }

    /// 重新标注一个文档
    ///
    /// 返回被采用的结果；文档未打开、无需计算或结果已过期时返回 `None`。
    pub async fn recompute(&self, document: &str) -> Option<Arc<Vec<LineAnnotation>>> {
        if !self.config().should_compute() {
            return None;
        }

        let (revision, lines) = {
            let mut entry = self.documents.get_mut(document)?;
            entry.revision = self.next_revision();
            (entry.revision, entry.lines.clone())
        };

        self.stats.computations.fetch_add(1, Ordering::Relaxed);
        let annotations = Arc::new(self.pipeline.annotate_document(&lines).await);

        {
            let Some(mut entry) = self.documents.get_mut(document) else {
                tracing::debug!("文档 {} 已关闭，丢弃标注结果", document);
                self.stats
                    .stale_results_dropped
                    .fetch_add(1, Ordering::Relaxed);
                return None;
            };
            if entry.revision != revision {
                tracing::debug!(
                    "文档 {} 的标注结果已过期（修订 {} < {}）",
                    document,
                    revision,
                    entry.revision
                );
                self.stats
                    .stale_results_dropped
                    .fetch_add(1, Ordering::Relaxed);
                return None;
            }
            entry.annotations = Some(Arc::clone(&annotations));
        }

        self.sink.publish(AnnotationUpdate::Annotated {
            document: document.to_string(),
            revision,
            annotations: Arc::clone(&annotations),
        });
        Some(annotations)
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        let task = self
            .readiness_task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = task {
            handle.abort();
        }
    }
}
