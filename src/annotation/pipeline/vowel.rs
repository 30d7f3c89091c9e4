//! 行末母音提取模块
//!
//! 只看原始文本末尾的字符，不依赖莫拉切分的合并结果。

use super::kana::{vowel_entry, VowelClass, VowelEntry, LONG_VOWEL_MARK};

/// 行末母音提取器
#[derive(Debug, Default, Clone, Copy)]
pub struct VowelExtractor;

impl VowelExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 取得文本最后一个音的母音
    ///
    /// 末尾是长音符且前面还有字符时，改用倒数第二个字符查表（母音继承）。
    /// 查不到（汉字、拉丁字母、标点、促音）返回 `None`。
    pub fn end_vowel(&self, text: &str) -> Option<VowelClass> {
        let trimmed = text.trim();
        let mut chars = trimmed.chars().rev();
        let last = chars.next()?;

        let key = if last == LONG_VOWEL_MARK {
            chars.next().unwrap_or(last)
        } else {
            last
        };

        match vowel_entry(key)? {
            VowelEntry::Vowel(vowel) => Some(vowel),
            // 连续两个长音符：不再继续回溯
            VowelEntry::Inherit => None,
        }
    }
}

/// 使用默认提取器
pub fn end_vowel(text: &str) -> Option<VowelClass> {
    VowelExtractor.end_vowel(text)
}
