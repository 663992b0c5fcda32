//! 搜索历史：容量50的外部键值存储，带上下翻阅与未保存文本暂存

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::utils::fs::{read_json_file, write_json_file};

/// 历史条目上限，超出后丢弃最旧的
pub const HISTORY_CAP: usize = 50;

const HISTORY_KEY: &str = "search_hist";

/// 简单外部键值存储的接口（浏览器localStorage的等价物）
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// 内存键值存储（测试与无持久化宿主）
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// 文件键值存储：以JSON对象落盘，跨会话保留
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    cache: Map<String, Value>,
}

impl FileKv {
    /// 打开或新建存储文件；读不出来时从空存储开始
    pub fn open(path: &Path) -> Self {
        let cache = match read_json_file(path) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("存储文件不是JSON对象，忽略: {}", path.display());
                Map::new()
            }
            Err(_) => Map::new(),
        };
        Self {
            path: path.to_path_buf(),
            cache,
        }
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).and_then(|v| v.as_str()).map(String::from)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.cache
            .insert(key.to_string(), Value::String(value.to_string()));
        if let Err(e) = write_json_file(&self.path, &Value::Object(self.cache.clone())) {
            tracing::error!("存储文件写入失败: {}: {}", self.path.display(), e);
        }
    }
}

/// 历史翻阅状态机。position为0表示停在活动输入行；
/// 向上翻离开活动行时把未保存的文本暂存，翻回0时恢复
pub struct SearchHistory<S: KvStore> {
    store: S,
    position: usize,
    stashed: Option<String>,
}

impl<S: KvStore> SearchHistory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            position: 0,
            stashed: None,
        }
    }

    fn load(&self) -> Vec<String> {
        self.store
            .get(HISTORY_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save(&mut self, entries: &[String]) {
        match serde_json::to_string(entries) {
            Ok(raw) => self.store.set(HISTORY_KEY, &raw),
            Err(e) => tracing::error!("历史序列化失败: {}", e),
        }
    }

    /// 提交一条查询：已存在的条目移到末尾，超出上限丢弃最旧的。
    /// 返回当前条目数
    pub fn push(&mut self, entry: &str) -> usize {
        let mut entries = self.load();
        if let Some(idx) = entries.iter().position(|e| e == entry) {
            entries.remove(idx);
        }
        entries.push(entry.to_string());
        while entries.len() > HISTORY_CAP {
            entries.remove(0);
        }
        self.save(&entries);
        self.position = 0;
        entries.len()
    }

    /// 向更早的历史翻一格；current是输入框里的活动文本
    pub fn up(&mut self, current: &str) -> Option<String> {
        if self.position == 0 && !current.trim().is_empty() {
            self.stashed = Some(current.trim().to_string());
        }
        let entries = self.load();
        if entries.is_empty() {
            return None;
        }
        let pos = (self.position + 1).min(entries.len()).min(HISTORY_CAP);
        self.position = pos;
        entries.get(entries.len() - pos).cloned()
    }

    /// 向更新的方向翻一格；翻回活动行时恢复暂存文本
    pub fn down(&mut self) -> Option<String> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        if self.position == 0 {
            return Some(self.stashed.clone().unwrap_or_default());
        }
        let entries = self.load();
        entries.get(entries.len().checked_sub(self.position)?).cloned()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> SearchHistory<MemoryKv> {
        SearchHistory::new(MemoryKv::new())
    }

    #[test]
    fn test_push_and_cap_at_fifty() {
        let mut h = history();
        for i in 0..HISTORY_CAP {
            h.push(&format!("query_{}", i));
        }
        assert_eq!(h.len(), HISTORY_CAP);

        // 第51条挤掉最旧的
        h.push("query_overflow");
        assert_eq!(h.len(), HISTORY_CAP, "历史不应该超过50条");
        let newest = h.up("");
        assert_eq!(newest.as_deref(), Some("query_overflow"));
        // 一路翻到最旧，确认query_0已经不在
        let mut oldest = newest;
        for _ in 1..HISTORY_CAP {
            oldest = h.up("");
        }
        assert_eq!(oldest.as_deref(), Some("query_1"), "最旧的一条应该被丢弃");
    }

    #[test]
    fn test_push_dedups_to_end() {
        let mut h = history();
        h.push("a");
        h.push("b");
        h.push("a");
        assert_eq!(h.len(), 2, "重复条目应该去重");
        assert_eq!(h.up("").as_deref(), Some("a"), "重复提交把条目移到末尾");
        assert_eq!(h.up("").as_deref(), Some("b"));
    }

    #[test]
    fn test_up_stashes_live_text_and_down_restores() {
        let mut h = history();
        h.push("old_query");
        assert_eq!(h.up("正在输入的内容").as_deref(), Some("old_query"));
        assert_eq!(h.position(), 1);
        assert_eq!(h.down().as_deref(), Some("正在输入的内容"), "翻回活动行应该恢复暂存文本");
        assert_eq!(h.position(), 0);
    }

    #[test]
    fn test_down_at_live_row_is_noop() {
        let mut h = history();
        h.push("x");
        assert!(h.down().is_none(), "活动行继续向下是无操作");
    }

    #[test]
    fn test_up_on_empty_history() {
        let mut h = history();
        assert!(h.up("live").is_none(), "空历史向上翻没有结果");
        assert_eq!(h.position(), 0);
    }

    #[test]
    fn test_up_clamps_at_oldest() {
        let mut h = history();
        h.push("first");
        h.push("second");
        h.up("");
        h.up("");
        // 已到最旧，继续向上停在原地
        assert_eq!(h.up("").as_deref(), Some("first"));
        assert_eq!(h.position(), 2);
    }

    #[test]
    fn test_file_kv_persists_across_sessions() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("kv.json");

        let mut h = SearchHistory::new(FileKv::open(&path));
        h.push("met.title");
        h.push("authors.*.name");

        // 重新打开同一文件，历史仍在
        let mut reopened = SearchHistory::new(FileKv::open(&path));
        assert_eq!(reopened.len(), 2, "历史应该跨会话保留");
        assert_eq!(reopened.up("").as_deref(), Some("authors.*.name"));
    }

    #[test]
    fn test_walk_sequence_up_down() {
        let mut h = history();
        h.push("q1");
        h.push("q2");
        h.push("q3");
        assert_eq!(h.up("").as_deref(), Some("q3"));
        assert_eq!(h.up("").as_deref(), Some("q2"));
        assert_eq!(h.down().as_deref(), Some("q3"));
        assert_eq!(h.down().as_deref(), Some(""), "没有暂存文本时回到空的活动行");
    }
}
