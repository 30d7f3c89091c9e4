//! 文本规范化模块
//!
//! 去除段落标签（`[Chorus]` 之类），并把 Suno 风格的行内注音 `漢字(かな)` 替换为注音本身。
//! 两步都是纯函数，对任意输入都有定义。

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 段落标签：非贪婪匹配方括号内的任意内容
const TAG_PATTERN: &str = r"\[.*?\]";
/// 行内注音：汉字串（含 々〆ヵヶ）紧跟半角括号包住的平假名/长音串
const RUBY_PATTERN: &str = r"([一-龯々〆ヵヶ]+)\(([ぁ-んー]+)\)";

/// 一处行内注音
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubyOverride {
    /// 被注音的汉字串
    pub kanji: String,
    /// 括号内的假名读音
    pub reading: String,
    /// 整个 `漢字(かな)` 在去标签文本中的字节范围
    pub range: Range<usize>,
}

/// 文本规范化器
pub struct TextNormalizer {
    regex_cache: RegexCache,
}

/// 正则表达式缓存
#[derive(Default)]
struct RegexCache {
    tag_regex: OnceLock<Regex>,
    ruby_regex: OnceLock<Regex>,
}

impl RegexCache {
    fn tag(&self) -> &Regex {
        self.tag_regex.get_or_init(|| {
            Regex::new(TAG_PATTERN).unwrap_or_else(|_| Regex::new(r"$^").unwrap())
        })
    }

    fn ruby(&self) -> &Regex {
        self.ruby_regex.get_or_init(|| {
            Regex::new(RUBY_PATTERN).unwrap_or_else(|_| Regex::new(r"$^").unwrap())
        })
    }
}

impl TextNormalizer {
    /// 创建新的规范化器
    pub fn new() -> Self {
        Self {
            regex_cache: RegexCache::default(),
        }
    }

    /// 规范化一行歌词：先去标签，再解析注音
    pub fn normalize(&self, line: &str) -> String {
        let stripped = self.strip_tags(line);
        self.resolve_ruby(&stripped)
    }

    /// 删除全部段落标签
    pub fn strip_tags(&self, line: &str) -> String {
        self.regex_cache.tag().replace_all(line, "").into_owned()
    }

    /// 把每处 `漢字(かな)` 替换为 `かな`
    ///
    /// 单遍、自左向右、互不重叠；替换结果不会被再次扫描。
    pub fn resolve_ruby(&self, text: &str) -> String {
        self.regex_cache.ruby().replace_all(text, "$2").into_owned()
    }

    /// 列出一行中的全部注音（按出现顺序，范围基于去标签后的文本）
    pub fn ruby_overrides(&self, line: &str) -> Vec<RubyOverride> {
        let stripped = self.strip_tags(line);
        self.regex_cache
            .ruby()
            .captures_iter(&stripped)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let kanji = caps.get(1)?;
                let reading = caps.get(2)?;
                Some(RubyOverride {
                    kanji: kanji.as_str().to_string(),
                    reading: reading.as_str().to_string(),
                    range: whole.range(),
                })
            })
            .collect()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// 使用进程内共享的默认规范化器
pub fn normalize(line: &str) -> String {
    static DEFAULT: OnceLock<TextNormalizer> = OnceLock::new();
    DEFAULT.get_or_init(TextNormalizer::new).normalize(line)
}
