//! 存储层：读音转换结果缓存

pub mod cache;

pub use cache::{CacheConfig, CacheStatsSnapshot, ConversionCache};
