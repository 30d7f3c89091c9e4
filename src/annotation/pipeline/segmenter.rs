//! 莫拉切分模块
//!
//! 按字符扫描文本：
//! - 非假名字符（未转写的汉字、标点、拉丁字母）直接丢弃，不产生莫拉；
//! - 小书假名并入前一个莫拉（`き` + `ゃ` → `きゃ`），若它出现在最前面则独立成莫拉；
//! - 长音符 `ー` 总是独立成一个莫拉。
//!
//! 结果只取决于输入字符串。

use super::kana::{classify, KanaClass};

/// 莫拉切分器
#[derive(Debug, Default, Clone, Copy)]
pub struct MoraSegmenter;

impl MoraSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// 把文本切分为莫拉序列
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut mora_list: Vec<String> = Vec::new();

        for c in text.chars() {
            match classify(c) {
                KanaClass::Other => {}
                KanaClass::SmallKana => match mora_list.last_mut() {
                    Some(previous) => previous.push(c),
                    None => mora_list.push(c.to_string()),
                },
                KanaClass::Hiragana | KanaClass::Katakana | KanaClass::LongMark => {
                    mora_list.push(c.to_string())
                }
            }
        }

        mora_list
    }

    /// 只计数、不分配
    pub fn count(&self, text: &str) -> usize {
        let mut count = 0;
        for c in text.chars() {
            match classify(c) {
                KanaClass::Other => {}
                KanaClass::SmallKana if count > 0 => {}
                _ => count += 1,
            }
        }
        count
    }
}

/// 使用默认切分器切分
pub fn segment(text: &str) -> Vec<String> {
    MoraSegmenter.segment(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_kana_merge() {
        assert_eq!(segment("きゃ"), vec!["きゃ"]);
        assert_eq!(segment("きゃく"), vec!["きゃ", "く"]);
        assert_eq!(segment("ファン"), vec!["ファ", "ン"]);
        assert_eq!(segment("くゎ"), vec!["くゎ"]);
    }

    #[test]
    fn test_long_vowel_is_own_mora() {
        assert_eq!(segment("すー"), vec!["す", "ー"]);
        assert_eq!(segment("スーパー"), vec!["ス", "ー", "パ", "ー"]);
    }

    #[test]
    fn test_sokuon_and_hatsuon_count() {
        assert_eq!(segment("きって"), vec!["き", "っ", "て"]);
        assert_eq!(segment("さんぽ"), vec!["さ", "ん", "ぽ"]);
    }

    #[test]
    fn test_leading_small_kana_starts_own_mora() {
        assert_eq!(segment("ゃあ"), vec!["ゃ", "あ"]);
    }

    #[test]
    fn test_small_kana_after_dropped_char_joins_last_mora() {
        // 中间的汉字被丢弃，小书假名并入此前最后一个莫拉
        assert_eq!(segment("か漢ゃ"), vec!["かゃ"]);
        // 小书假名可以并入长音符
        assert_eq!(segment("ーぁ"), vec!["ーぁ"]);
    }

    #[test]
    fn test_non_kana_dropped() {
        assert!(segment("明日").is_empty());
        assert!(segment("Hello, world!").is_empty());
        assert_eq!(segment("I love あなた!"), vec!["あ", "な", "た"]);
    }

    #[test]
    fn test_count_matches_segment() {
        for s in ["", "きゃく", "ゃゃゃ", "スーパー", "明日(あした)", "a ぃ b ぃ"] {
            assert_eq!(MoraSegmenter.count(s), segment(s).len(), "mismatch for {:?}", s);
        }
    }
}
