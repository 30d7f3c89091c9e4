//! 读音转换缓存
//!
//! 对 `convert` 的成功结果做 LRU 记忆。失败回退的结果不会写入缓存，
//! 以免把一次偶发错误固化下来。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use blake3::Hasher;
use lru::LruCache;

use crate::annotation::config::constants;

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: constants::DEFAULT_CACHE_SIZE,
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub inserts: AtomicUsize,
}

/// 缓存统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: usize,
    pub misses: usize,
    pub inserts: usize,
    pub entries: usize,
}

impl CacheStatsSnapshot {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 转换结果缓存
pub struct ConversionCache {
    entries: Mutex<LruCache<String, String>>,
    stats: CacheStats,
}

impl ConversionCache {
    /// 创建指定容量的缓存，容量为0时退回默认容量
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(constants::DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    /// 根据配置创建；未启用时返回 `None`
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.capacity))
    }

    /// 生成缓存键
    pub fn cache_key(text: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(text.as_bytes());
        format!("reading:{}", hasher.finalize().to_hex())
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 查询缓存
    pub fn get(&self, text: &str) -> Option<String> {
        let key = Self::cache_key(text);
        let found = self.lock().get(&key).cloned();

        match found {
            Some(_) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// 写入缓存
    pub fn insert(&self, text: &str, converted: String) {
        let key = Self::cache_key(text);
        self.lock().put(key, converted);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for ConversionCache {
    fn default() -> Self {
        Self::new(constants::DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = ConversionCache::new(10);

        cache.insert("明日", "あした".to_string());
        assert_eq!(cache.get("明日"), Some("あした".to_string()));
        assert_eq!(cache.get("今日"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("明日"), None);
    }

    #[test]
    fn test_cache_stats() {
        let cache = ConversionCache::new(10);
        cache.insert("空", "そら".to_string());

        cache.get("空");
        cache.get("海");

        let stats = cache.snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ConversionCache::new(2);
        cache.insert("一", "いち".to_string());
        cache.insert("二", "に".to_string());
        // 访问「一」使其成为最近使用
        assert!(cache.get("一").is_some());
        cache.insert("三", "さん".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("二").is_none());
        assert!(cache.get("一").is_some());
        assert!(cache.get("三").is_some());
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        let cache = ConversionCache::new(0);
        cache.insert("花", "はな".to_string());
        assert_eq!(cache.get("花"), Some("はな".to_string()));
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = CacheConfig {
            enabled: false,
            capacity: 10,
        };
        assert!(ConversionCache::from_config(&config).is_none());
        assert!(ConversionCache::from_config(&CacheConfig::default()).is_some());
    }

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(ConversionCache::cache_key("歌"), ConversionCache::cache_key("歌"));
        assert_ne!(ConversionCache::cache_key("歌"), ConversionCache::cache_key("詩"));
        assert!(ConversionCache::cache_key("歌").starts_with("reading:"));
    }
}
