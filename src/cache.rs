//! 内存中的日志缓存：按 LogId 存放完整记录，带 TTL 与容量上限。
//!
//! 过期采用惰性策略，只在 `get` 命中过期条目时删除。容量满时按插入时间淘汰最旧的
//! 约 10%（至少一条）。`get` 不刷新插入时间，因此这不是严格意义上的 LRU。

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{LogEntry, LogId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_ms() -> u64 {
    30 * 60 * 1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

/// 毫秒级墙钟。系统时间回拨会导致条目提前或延后过期。
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 手动推进的时钟，用于测试过期与淘汰顺序。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct CacheEntry {
    entry: Arc<LogEntry>,
    inserted_at_ms: i64,
    // 同一毫秒内插入的条目按序号区分先后
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<LogId, CacheEntry>,
    next_seq: u64,
}

pub struct LogCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl LogCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let config = CacheConfig {
            max_entries: config.max_entries.max(1),
            ..config
        };
        Self {
            config,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// 插入或覆盖 `id` 对应的记录。缓存已满时先淘汰最旧的条目再插入。
    pub fn add(&self, id: LogId, entry: LogEntry) {
        let now = self.clock.now_ms();
        let mut state = self.lock();

        if state.entries.len() >= self.config.max_entries {
            let evicted = Self::evict_oldest(&mut state, self.eviction_batch());
            debug!(evicted, capacity = self.config.max_entries, "log cache full, evicted oldest entries");
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            id,
            CacheEntry {
                entry: Arc::new(entry),
                inserted_at_ms: now,
                seq,
            },
        );
    }

    /// 返回未过期的记录；命中过期条目时顺带删除并返回 `None`。
    pub fn get(&self, id: &LogId) -> Option<Arc<LogEntry>> {
        let now = self.clock.now_ms();
        let mut state = self.lock();

        let age = now - state.entries.get(id)?.inserted_at_ms;
        if age > self.ttl_ms() {
            state.entries.remove(id);
            debug!(log_id = %id, age_ms = age, "dropped expired cache entry");
            return None;
        }
        state.entries.get(id).map(|c| Arc::clone(&c.entry))
    }

    /// 当前条目数，包含尚未被惰性清理的过期条目。
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 超出 i64 的 TTL 视为永不过期
    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.config.ttl_ms).unwrap_or(i64::MAX)
    }

    fn eviction_batch(&self) -> usize {
        (self.config.max_entries / 10).max(1)
    }

    fn evict_oldest(state: &mut CacheState, count: usize) -> usize {
        let mut by_age: Vec<(i64, u64, LogId)> = state
            .entries
            .iter()
            .map(|(id, c)| (c.inserted_at_ms, c.seq, id.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(ts, seq, _)| (*ts, *seq));

        by_age
            .into_iter()
            .take(count)
            .filter(|(_, _, id)| state.entries.remove(id).is_some())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for LogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}
