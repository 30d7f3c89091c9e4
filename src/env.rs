//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量都以 `JLYRICS_` 为前缀（`NO_COLOR` 除外）。

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::annotation::config::{constants, StartPolicy};

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量；未设置时使用默认值，没有默认值则报错
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => match Self::DEFAULT {
                Some(default) => Ok(default),
                None => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Required environment variable not set".to_string(),
                }),
            },
        }
    }

    /// 只在变量实际设置时返回结果，不回落到默认值
    fn get_if_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "JLYRICS_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let level = value.trim().to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 展示开关
pub mod display {
    use super::*;

    /// 显示莫拉数
    pub struct ShowMoraCount;
    impl EnvVar<bool> for ShowMoraCount {
        const NAME: &'static str = "JLYRICS_SHOW_MORA_COUNT";
        const DEFAULT: Option<bool> = Some(constants::DEFAULT_SHOW_MORA_COUNT);
        const DESCRIPTION: &'static str = "Show the per-line mora count";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 显示行末母音
    pub struct ShowVowel;
    impl EnvVar<bool> for ShowVowel {
        const NAME: &'static str = "JLYRICS_SHOW_VOWEL";
        const DEFAULT: Option<bool> = Some(constants::DEFAULT_SHOW_VOWEL);
        const DESCRIPTION: &'static str = "Show the vowel of each line's trailing sound";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 读音引擎
pub mod engine {
    use super::*;

    /// 启动策略
    pub struct StartPolicyVar;
    impl EnvVar<StartPolicy> for StartPolicyVar {
        const NAME: &'static str = "JLYRICS_START_POLICY";
        const DEFAULT: Option<StartPolicy> = Some(StartPolicy::Lazy);
        const DESCRIPTION: &'static str =
            "When to load the reading engine: eager (session start) or lazy (first document)";

        fn parse(value: &str) -> EnvResult<StartPolicy> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid start policy '{}'. Use: eager, lazy", value),
            })
        }
    }

    /// 词典路径
    pub struct DictionaryPath;
    impl EnvVar<PathBuf> for DictionaryPath {
        const NAME: &'static str = "JLYRICS_DICTIONARY_PATH";
        const DEFAULT: Option<PathBuf> = None;
        const DESCRIPTION: &'static str = "Path of the reading engine system dictionary";

        fn parse(value: &str) -> EnvResult<PathBuf> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Dictionary path cannot be empty".to_string(),
                });
            }
            Ok(PathBuf::from(shellexpand::tilde(trimmed).into_owned()))
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "JLYRICS_CACHE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Memoize reading conversions";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存容量
    pub struct Size;
    impl EnvVar<usize> for Size {
        const NAME: &'static str = "JLYRICS_CACHE_SIZE";
        const DEFAULT: Option<usize> = Some(constants::DEFAULT_CACHE_SIZE);
        const DESCRIPTION: &'static str = "Maximum number of memoized conversions (LRU)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, constants::MAX_CACHE_SIZE)
        }
    }
}

/// 性能相关环境变量
pub mod performance {
    use super::*;

    /// 并行处理
    pub struct ParallelEnabled;
    impl EnvVar<bool> for ParallelEnabled {
        const NAME: &'static str = "JLYRICS_PARALLEL_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Segment document lines on the rayon thread pool";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 单批次最大并发转换数
    pub struct MaxConcurrentConversions;
    impl EnvVar<usize> for MaxConcurrentConversions {
        const NAME: &'static str = "JLYRICS_MAX_CONCURRENT_CONVERSIONS";
        const DEFAULT: Option<usize> = Some(constants::DEFAULT_MAX_CONCURRENT_CONVERSIONS);
        const DESCRIPTION: &'static str = "Upper bound on in-flight conversions per document";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, constants::MAX_CONCURRENT_CONVERSIONS)
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,

    pub show_mora_count: bool,
    pub show_vowel: bool,

    pub start_policy: StartPolicy,
    pub dictionary_path: Option<PathBuf>,

    pub cache_enabled: bool,
    pub cache_size: usize,

    pub parallel_enabled: bool,
    pub max_concurrent_conversions: usize,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,

            show_mora_count: display::ShowMoraCount::get()?,
            show_vowel: display::ShowVowel::get()?,

            start_policy: engine::StartPolicyVar::get()?,
            dictionary_path: engine::DictionaryPath::get_if_set().transpose()?,

            cache_enabled: cache::Enabled::get()?,
            cache_size: cache::Size::get()?,

            parallel_enabled: performance::ParallelEnabled::get()?,
            max_concurrent_conversions: performance::MaxConcurrentConversions::get()?,
        })
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Log Level: {}", self.log_level);
        println!("  Start Policy: {}", self.start_policy);
        match &self.dictionary_path {
            Some(path) => println!("  Dictionary: {}", path.display()),
            None => println!("  Dictionary: [not configured]"),
        }
        println!(
            "  Cache: {}",
            if self.cache_enabled { "enabled" } else { "disabled" }
        );
        println!(
            "  Parallel: {}",
            if self.parallel_enabled { "enabled" } else { "disabled" }
        );
    }
}

fn doc_line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        V::NAME,
        V::DESCRIPTION,
        V::DEFAULT
    ));
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    doc_line::<String, core::LogLevel>(&mut docs);
    doc_line::<bool, core::NoColor>(&mut docs);

    docs.push_str("\n## Display Configuration\n\n");
    doc_line::<bool, display::ShowMoraCount>(&mut docs);
    doc_line::<bool, display::ShowVowel>(&mut docs);

    docs.push_str("\n## Reading Engine Configuration\n\n");
    doc_line::<StartPolicy, engine::StartPolicyVar>(&mut docs);
    doc_line::<PathBuf, engine::DictionaryPath>(&mut docs);

    docs.push_str("\n## Cache Configuration\n\n");
    doc_line::<bool, cache::Enabled>(&mut docs);
    doc_line::<usize, cache::Size>(&mut docs);

    docs.push_str("\n## Performance Configuration\n\n");
    doc_line::<bool, performance::ParallelEnabled>(&mut docs);
    doc_line::<usize, performance::MaxConcurrentConversions>(&mut docs);

    docs
}
