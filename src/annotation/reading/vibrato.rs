//! vibrato 形态素分析器适配
//!
//! 词典需要是未压缩的 vibrato 系统词典（`Dictionary::read` 可直接读取的格式）。
//! 读音取自 IPADIC 布局的第 8 个素性字段（下标 7）；该字段缺失或为 `*` 时退回表层形。

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use vibrato::{Dictionary, Tokenizer};

use super::{ConversionMode, ConversionOptions, ReadingService, ReadingTarget};
use crate::annotation::error::{helpers, AnnotationError, AnnotationResult};
use crate::annotation::pipeline::kana::{fold_to_hiragana, fold_to_katakana};

/// 读音所在的素性字段下标
const READING_FIELD: usize = 7;

/// 基于 vibrato 的读音服务
pub struct VibratoReadingService {
    dictionary_path: Option<PathBuf>,
    tokenizer: OnceLock<Tokenizer>,
}

impl VibratoReadingService {
    /// 从词典文件创建；词典在 `init` 时才加载
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            dictionary_path: Some(path.as_ref().to_path_buf()),
            tokenizer: OnceLock::new(),
        }
    }

    /// 使用已经构建好的词典
    pub fn from_dictionary(dictionary: Dictionary) -> Self {
        let tokenizer = OnceLock::new();
        let _ = tokenizer.set(Tokenizer::new(dictionary));
        Self {
            dictionary_path: None,
            tokenizer,
        }
    }

    fn load_dictionary(path: &Path) -> AnnotationResult<Dictionary> {
        let file = File::open(path).map_err(|e| {
            AnnotationError::DictionaryError(format!("打开词典 {} 失败: {}", path.display(), e))
        })?;
        Dictionary::read(BufReader::new(file)).map_err(|e| {
            AnnotationError::DictionaryError(format!("读取词典 {} 失败: {}", path.display(), e))
        })
    }

    fn reading_of<'a>(surface: &'a str, feature: &'a str) -> &'a str {
        match feature.split(',').nth(READING_FIELD) {
            Some(reading) if !reading.is_empty() && reading != "*" => reading,
            _ => surface,
        }
    }
}

#[async_trait]
impl ReadingService for VibratoReadingService {
    fn name(&self) -> &str {
        "vibrato"
    }

    async fn init(&self) -> AnnotationResult<()> {
        if self.tokenizer.get().is_some() {
            return Ok(());
        }

        let path = self
            .dictionary_path
            .clone()
            .ok_or_else(|| helpers::engine_init_error("没有可用的词典"))?;

        tracing::debug!("在阻塞线程上加载词典: {}", path.display());
        let dictionary =
            tokio::task::spawn_blocking(move || Self::load_dictionary(&path)).await??;

        // 由生命周期保证只初始化一次；这里重复设置时保留先前的实例
        let _ = self.tokenizer.set(Tokenizer::new(dictionary));
        Ok(())
    }

    async fn convert(&self, text: &str, options: ConversionOptions) -> AnnotationResult<String> {
        let tokenizer = self
            .tokenizer
            .get()
            .ok_or(AnnotationError::EngineNotReady)?;

        if text.is_empty() {
            return Ok(String::new());
        }

        let mut worker = tokenizer.new_worker();
        worker.reset_sentence(text);
        worker.tokenize();

        let separator = match options.mode {
            ConversionMode::Normal => "",
            ConversionMode::Spaced => " ",
        };

        let readings: Vec<String> = (0..worker.num_tokens())
            .map(|i| {
                let token = worker.token(i);
                Self::reading_of(token.surface(), token.feature()).to_string()
            })
            .collect();
        let joined = readings.join(separator);

        Ok(match options.target {
            ReadingTarget::Hiragana => fold_to_hiragana(&joined),
            ReadingTarget::Katakana => fold_to_katakana(&joined),
        })
    }
}
