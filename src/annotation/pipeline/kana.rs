//! 假名分类表与母音表
//!
//! 所有分类都在编译期预先计算成覆盖平假名、片假名两个区块（U+3040..=U+30FF）的查找表，
//! 运行时只需一次下标访问即可完成 O(1) 分类。区块之外的字符一律视为 [`KanaClass::Other`]。
//!
//! 可计数的范围与编辑器插件保持一致：`ぁ`..=`ん`、`ァ`..=`ヶ` 以及长音符 `ー`。
//! `ゔ`、`ゝ`、`ゞ`、`・` 等区块内的其它字符不产生莫拉。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 长音符
pub const LONG_VOWEL_MARK: char = 'ー';

/// 表覆盖区间起点（平假名区块起点）
const TABLE_START: u32 = 0x3040;
/// 表长度：平假名区块 + 片假名区块
const TABLE_LEN: usize = 0xC0;

const HIRAGANA_FIRST: u32 = 0x3041; // ぁ
const HIRAGANA_LAST: u32 = 0x3093; // ん
const KATAKANA_FIRST: u32 = 0x30A1; // ァ
const KATAKANA_LAST: u32 = 0x30F6; // ヶ
const LONG_MARK: u32 = 0x30FC; // ー

/// 与前一个假名合并为一个莫拉的小书假名（拗音、小元音以及小「わ」）
///
/// 促音 `っ`/`ッ` 不在其中：它本身就是一个莫拉。
pub const SMALL_KANA: [char; 18] = [
    'ぁ', 'ぃ', 'ぅ', 'ぇ', 'ぉ', 'ゃ', 'ゅ', 'ょ', 'ゎ', //
    'ァ', 'ィ', 'ゥ', 'ェ', 'ォ', 'ャ', 'ュ', 'ョ', 'ヮ',
];

/// 字符分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KanaClass {
    /// 可计数的平假名
    Hiragana,
    /// 可计数的片假名
    Katakana,
    /// 长音符 `ー`，总是独立成一个莫拉
    LongMark,
    /// 小书假名，会并入前一个莫拉
    SmallKana,
    /// 其它字符（汉字、标点、拉丁字母等），不产生莫拉
    Other,
}

impl KanaClass {
    /// 是否参与莫拉切分
    pub fn is_segmentable(self) -> bool {
        !matches!(self, KanaClass::Other)
    }
}

static CLASS_TABLE: [KanaClass; TABLE_LEN] = build_class_table();

const fn is_small_kana(cp: u32) -> bool {
    let mut i = 0;
    while i < SMALL_KANA.len() {
        if SMALL_KANA[i] as u32 == cp {
            return true;
        }
        i += 1;
    }
    false
}

const fn build_class_table() -> [KanaClass; TABLE_LEN] {
    let mut table = [KanaClass::Other; TABLE_LEN];
    let mut i = 0;
    while i < TABLE_LEN {
        let cp = TABLE_START + i as u32;
        table[i] = if is_small_kana(cp) {
            KanaClass::SmallKana
        } else if cp == LONG_MARK {
            KanaClass::LongMark
        } else if cp >= HIRAGANA_FIRST && cp <= HIRAGANA_LAST {
            KanaClass::Hiragana
        } else if cp >= KATAKANA_FIRST && cp <= KATAKANA_LAST {
            KanaClass::Katakana
        } else {
            KanaClass::Other
        };
        i += 1;
    }
    table
}

/// 对单个字符分类
#[inline]
pub fn classify(c: char) -> KanaClass {
    let cp = c as u32;
    if cp < TABLE_START {
        return KanaClass::Other;
    }
    CLASS_TABLE
        .get((cp - TABLE_START) as usize)
        .copied()
        .unwrap_or(KanaClass::Other)
}

/// 母音类别：五个母音核加上拨音
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VowelClass {
    A,
    I,
    U,
    E,
    O,
    /// 拨音 `ん`
    N,
}

impl VowelClass {
    pub const ALL: [VowelClass; 6] = [
        VowelClass::A,
        VowelClass::I,
        VowelClass::U,
        VowelClass::E,
        VowelClass::O,
        VowelClass::N,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VowelClass::A => "a",
            VowelClass::I => "i",
            VowelClass::U => "u",
            VowelClass::E => "e",
            VowelClass::O => "o",
            VowelClass::N => "n",
        }
    }
}

impl fmt::Display for VowelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 母音表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VowelEntry {
    Vowel(VowelClass),
    /// 长音符：没有自己的母音，继承前一个音节
    Inherit,
}

// 只收录直音；小书假名、促音、ゐゑ、ヴ 不在表中
const A_ROW: &str = "あかがさざただなはばぱまやらわアカガサザタダナハバパマヤラワ";
const I_ROW: &str = "いきぎしじちぢにひびぴみりイキギシジチヂニヒビピミリ";
const U_ROW: &str = "うくぐすずつづぬふぶぷむゆるウクグスズツヅヌフブプムユル";
const E_ROW: &str = "えけげせぜてでねへべぺめれエケゲセゼテデネヘベペメレ";
const O_ROW: &str = "おこごそぞとどのほぼぽもよろをオコゴソゾトドノホボポモヨロヲ";
const N_ROW: &str = "んン";

static VOWEL_TABLE: [Option<VowelEntry>; TABLE_LEN] = build_vowel_table();

/// 在编译期逐字节解码一行 UTF-8 字符并填表
const fn fill_row(
    mut table: [Option<VowelEntry>; TABLE_LEN],
    row: &str,
    vowel: VowelClass,
) -> [Option<VowelEntry>; TABLE_LEN] {
    let bytes = row.as_bytes();
    let mut i = 0;
    // 行内全部是三字节的 UTF-8 字符
    while i + 2 < bytes.len() {
        let cp = ((bytes[i] as u32 & 0x0F) << 12)
            | ((bytes[i + 1] as u32 & 0x3F) << 6)
            | (bytes[i + 2] as u32 & 0x3F);
        if cp >= TABLE_START && cp < TABLE_START + TABLE_LEN as u32 {
            table[(cp - TABLE_START) as usize] = Some(VowelEntry::Vowel(vowel));
        }
        i += 3;
    }
    table
}

const fn build_vowel_table() -> [Option<VowelEntry>; TABLE_LEN] {
    let mut table = [None; TABLE_LEN];
    table = fill_row(table, A_ROW, VowelClass::A);
    table = fill_row(table, I_ROW, VowelClass::I);
    table = fill_row(table, U_ROW, VowelClass::U);
    table = fill_row(table, E_ROW, VowelClass::E);
    table = fill_row(table, O_ROW, VowelClass::O);
    table = fill_row(table, N_ROW, VowelClass::N);
    table[(LONG_MARK - TABLE_START) as usize] = Some(VowelEntry::Inherit);
    table
}

/// 查母音表
///
/// 未收录的字符（小书假名、促音、汉字、拉丁字母、标点）返回 `None`。
#[inline]
pub fn vowel_entry(c: char) -> Option<VowelEntry> {
    let cp = c as u32;
    if cp < TABLE_START {
        return None;
    }
    VOWEL_TABLE
        .get((cp - TABLE_START) as usize)
        .copied()
        .flatten()
}

/// 片假名折叠为平假名
///
/// `ヴ`、`ヵ`、`ヶ` 没有可计数的平假名对应字，保持原样；长音符也保持原样。
pub fn to_hiragana(c: char) -> char {
    let cp = c as u32;
    if (KATAKANA_FIRST..=0x30F3).contains(&cp) {
        char::from_u32(cp - 0x60).unwrap_or(c)
    } else {
        c
    }
}

/// 整串片假名折叠为平假名
pub fn fold_to_hiragana(text: &str) -> String {
    text.chars().map(to_hiragana).collect()
}

/// 平假名转为片假名
pub fn to_katakana(c: char) -> char {
    let cp = c as u32;
    if (HIRAGANA_FIRST..=HIRAGANA_LAST).contains(&cp) {
        char::from_u32(cp + 0x60).unwrap_or(c)
    } else {
        c
    }
}

pub fn fold_to_katakana(text: &str) -> String {
    text.chars().map(to_katakana).collect()
}
