//! 文本处理管道：规范化、莫拉切分、行末母音提取
//!
//! 这些组件都是同步、无副作用的纯函数，不会挂起。

pub mod kana;
pub mod normalizer;
pub mod segmenter;
pub mod vowel;

pub use kana::{classify, KanaClass, VowelClass, VowelEntry};
pub use normalizer::{RubyOverride, TextNormalizer};
pub use segmenter::MoraSegmenter;
pub use vowel::VowelExtractor;
