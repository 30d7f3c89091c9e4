//! 行标注管道
//!
//! 本模块把规范化、读音转换、莫拉切分和行末母音提取串成一条管道，
//! 为单行或整篇文档生成 [`LineAnnotation`]。
//!
//! ## 处理流程
//!
//! 1. `TextNormalizer` 去除段落标签并解析行内注音 → `normalized_text`
//! 2. 读音引擎就绪时调用 `lifecycle.convert`，否则沿用规范化文本
//! 3. `MoraSegmenter` 切分转换后的文本 → `mora_list` / `mora_count`
//! 4. `VowelExtractor` 在转换后的文本上独立提取行末母音
//!
//! ## 批处理
//!
//! 文档中的每一行互不依赖。`annotate_document` 先并发地完成所有转换
//! （用信号量限制同时在途的调用数），再把纯同步的切分与提取交给 rayon。
//! 输出顺序与输入一致。
//!
//! 管道在两次调用之间不保存任何与文档有关的状态，何时重新计算由调用方决定。

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use futures::future::join_all;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::lifecycle::ReadingEngineLifecycle;
use crate::annotation::config::{constants, AnnotationConfig};
use crate::annotation::pipeline::{
    MoraSegmenter, RubyOverride, TextNormalizer, VowelClass, VowelExtractor,
};

/// 单行标注结果
///
/// 总是整体替换，不做局部修改。`mora_count == mora_list.len()` 恒成立。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAnnotation {
    /// 莫拉数
    pub mora_count: usize,
    /// 行末母音，`None` 表示无法判定
    pub end_vowel: Option<VowelClass>,
    /// 莫拉分解
    pub mora_list: Vec<String>,
    /// 去标签、解析注音后的文本
    pub normalized_text: String,
    /// 读音转换后的文本；只有转换确实改变了文本时才存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_text: Option<String>,
    /// 行内注音
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ruby: Vec<RubyOverride>,
    /// 原始行文本
    pub raw_text: String,
}

impl LineAnnotation {
    fn build(
        raw_text: String,
        normalized_text: String,
        converted: String,
        ruby: Vec<RubyOverride>,
        segmenter: &MoraSegmenter,
        extractor: &VowelExtractor,
    ) -> Self {
        let mora_list = segmenter.segment(&converted);
        let end_vowel = extractor.end_vowel(&converted);
        let converted_text = (converted != normalized_text).then_some(converted);

        Self {
            mora_count: mora_list.len(),
            end_vowel,
            mora_list,
            normalized_text,
            converted_text,
            ruby,
            raw_text,
        }
    }

    /// 实际参与切分的文本
    pub fn effective_text(&self) -> &str {
        self.converted_text
            .as_deref()
            .unwrap_or(&self.normalized_text)
    }

    /// 空行或只有段落标签的行
    pub fn is_blank(&self) -> bool {
        self.normalized_text.trim().is_empty()
    }

    /// 悬停提示用的多行摘要
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let mut header = format!("モーラ数: {}", self.mora_count);
        if let Some(vowel) = self.end_vowel {
            header.push_str(&format!(" | 母音: {}", vowel));
        }
        lines.push(header);

        if !self.mora_list.is_empty() {
            lines.push(format!("分解: {}", self.mora_list.join(" / ")));
        }

        lines.push(format!("変換前: {}", self.raw_text));

        if !self.ruby.is_empty() {
            let ruby: Vec<String> = self
                .ruby
                .iter()
                .map(|r| format!("{}→{}", r.kanji, r.reading))
                .collect();
            lines.push(format!("ルビ: {}", ruby.join(", ")));
        }

        if let Some(converted) = &self.converted_text {
            lines.push(format!("変換後: {}", converted));
        }

        lines.join("\n")
    }
}

/// 管道选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub parallel_enabled: bool,
    pub max_concurrent_conversions: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallel_enabled: true,
            max_concurrent_conversions: constants::DEFAULT_MAX_CONCURRENT_CONVERSIONS,
        }
    }
}

impl From<&AnnotationConfig> for PipelineOptions {
    fn from(config: &AnnotationConfig) -> Self {
        Self {
            parallel_enabled: config.parallel_enabled,
            max_concurrent_conversions: config.max_concurrent_conversions.max(1),
        }
    }
}

/// 管道统计信息
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// 标注过的行数
    pub lines_annotated: AtomicUsize,
    /// 标注过的文档数
    pub documents_annotated: AtomicUsize,
    /// 文本被读音转换改变的行数
    pub lines_converted: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl PipelineStats {
    fn record_lines(&self, annotations: &[LineAnnotation]) {
        self.lines_annotated
            .fetch_add(annotations.len(), Ordering::Relaxed);
        let converted = annotations
            .iter()
            .filter(|a| a.converted_text.is_some())
            .count();
        self.lines_converted.fetch_add(converted, Ordering::Relaxed);
    }

    fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            lines_annotated: self.lines_annotated.load(Ordering::Relaxed),
            documents_annotated: self.documents_annotated.load(Ordering::Relaxed),
            lines_converted: self.lines_converted.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 管道统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub lines_annotated: usize,
    pub documents_annotated: usize,
    pub lines_converted: usize,
    pub processing_time: Duration,
}

/// 服务健康状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// 整体健康级别
    pub overall: HealthLevel,
    /// 各组件的健康级别，键为组件名
    pub components: HashMap<String, HealthLevel>,
}

/// 健康级别
///
/// - `Healthy`: 所有功能可用
/// - `Degraded`: 读音引擎不可用，只计数原生假名
/// - `Unhealthy`: 无法工作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// 行标注管道
pub struct LineAnnotationPipeline {
    lifecycle: Arc<ReadingEngineLifecycle>,
    normalizer: TextNormalizer,
    segmenter: MoraSegmenter,
    extractor: VowelExtractor,
    options: PipelineOptions,
    stats: PipelineStats,
}

impl LineAnnotationPipeline {
    pub fn new(lifecycle: Arc<ReadingEngineLifecycle>, options: PipelineOptions) -> Self {
        Self {
            lifecycle,
            normalizer: TextNormalizer::new(),
            segmenter: MoraSegmenter::new(),
            extractor: VowelExtractor::new(),
            options,
            stats: PipelineStats::default(),
        }
    }

    pub fn from_config(lifecycle: Arc<ReadingEngineLifecycle>, config: &AnnotationConfig) -> Self {
        Self::new(lifecycle, PipelineOptions::from(config))
    }

    pub fn lifecycle(&self) -> &Arc<ReadingEngineLifecycle> {
        &self.lifecycle
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// 标注单行
    pub async fn annotate(&self, raw_line: &str) -> LineAnnotation {
        let started = Instant::now();

        let normalized = self.normalizer.normalize(raw_line);
        let ruby = self.normalizer.ruby_overrides(raw_line);
        let converted = self.convert(&normalized).await;

        let annotation = LineAnnotation::build(
            raw_line.to_string(),
            normalized,
            converted,
            ruby,
            &self.segmenter,
            &self.extractor,
        );

        self.stats.record_lines(std::slice::from_ref(&annotation));
        self.stats.add_processing_time(started.elapsed());
        annotation
    }

    /// 标注整篇文档，输出与输入一一对应
    pub async fn annotate_document<S: AsRef<str>>(&self, lines: &[S]) -> Vec<LineAnnotation> {
        let started = Instant::now();

        let normalized: Vec<(String, Vec<RubyOverride>)> = lines
            .iter()
            .map(|line| {
                let line = line.as_ref();
                (
                    self.normalizer.normalize(line),
                    self.normalizer.ruby_overrides(line),
                )
            })
            .collect();

        let converted = self.convert_all(&normalized).await;

        let prepared: Vec<(String, String, String, Vec<RubyOverride>)> = lines
            .iter()
            .zip(normalized)
            .zip(converted)
            .map(|((raw, (normalized, ruby)), converted)| {
                (raw.as_ref().to_string(), normalized, converted, ruby)
            })
            .collect();

        let segmenter = &self.segmenter;
        let extractor = &self.extractor;
        let build = |(raw, normalized, converted, ruby): (String, String, String, Vec<RubyOverride>)| {
            LineAnnotation::build(raw, normalized, converted, ruby, segmenter, extractor)
        };

        let annotations: Vec<LineAnnotation> =
            if self.options.parallel_enabled && prepared.len() >= constants::PARALLEL_MIN_LINES {
                prepared.into_par_iter().map(build).collect()
            } else {
                prepared.into_iter().map(build).collect()
            };

        self.stats.documents_annotated.fetch_add(1, Ordering::Relaxed);
        self.stats.record_lines(&annotations);
        self.stats.add_processing_time(started.elapsed());

        tracing::debug!(
            "文档标注完成: {} 行，耗时 {:?}",
            annotations.len(),
            started.elapsed()
        );
        annotations
    }

    async fn convert(&self, normalized: &str) -> String {
        if self.lifecycle.is_ready() {
            self.lifecycle.convert(normalized).await
        } else {
            normalized.to_string()
        }
    }

    async fn convert_all(&self, normalized: &[(String, Vec<RubyOverride>)]) -> Vec<String> {
        if !self.lifecycle.is_ready() {
            return normalized.iter().map(|(text, _)| text.clone()).collect();
        }

        let semaphore = Semaphore::new(self.options.max_concurrent_conversions.max(1));
        let semaphore = &semaphore;

        let tasks = normalized.iter().map(|(text, _)| async move {
            // 信号量从不关闭，acquire 不会失败
            let _permit = semaphore.acquire().await.ok();
            self.lifecycle.convert(text).await
        });

        join_all(tasks).await
    }

    /// 健康检查
    pub fn health(&self) -> HealthStatus {
        let mut components = HashMap::new();
        components.insert("reading_engine".to_string(), self.lifecycle.health());
        components.insert("pipeline".to_string(), HealthLevel::Healthy);
        components.insert(
            "cache".to_string(),
            match self.lifecycle.cache() {
                Some(_) => HealthLevel::Healthy,
                None => HealthLevel::Degraded,
            },
        );

        let overall = if components.values().all(|&level| level == HealthLevel::Healthy) {
            HealthLevel::Healthy
        } else if components.values().any(|&level| level == HealthLevel::Unhealthy) {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Degraded
        };

        HealthStatus { overall, components }
    }
}
