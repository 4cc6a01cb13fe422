//! 会话快照存储
//!
//! 每次修改会话后整体写入一次快照（后写覆盖先写），启动时读取一次。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::models::session::GenerationSession;

/// 会话快照存储
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &GenerationSession) -> Result<(), StoreError>;

    /// 没有快照时返回 `None`；内容损坏返回 `StoreError::Corrupt`
    async fn load(&self) -> Result<Option<GenerationSession>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// 快照位置（用于日志）
    fn location(&self) -> String;
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// 文件快照：`{dir}/{key}.json`
///
/// 先写临时文件再改名，进程中途退出不会留下半个快照。
pub struct FileSessionStore {
    dir: PathBuf,
    key: String,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", self.key))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &GenerationSession) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| io_error(&temp, e))?;
        let path = self.path();
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!("[会话] 💾 快照已保存 ({:?}, {}%)", session.stage, session.progress_percent);
        Ok(())
    }

    async fn load(&self) -> Result<Option<GenerationSession>, StoreError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let path = self.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("[会话] 🗑️ 快照已清除");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn location(&self) -> String {
        self.path().display().to_string()
    }
}

/// 内存快照（测试 / 不持久化）
///
/// 同样保存序列化后的文本，读取路径与文件存储一致。
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一段原始快照文本
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(raw.into());
        }
        store
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    fn poisoned() -> StoreError {
        StoreError::Io {
            path: "memory".to_string(),
            source: std::io::Error::other("快照锁已损坏"),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &GenerationSession) -> Result<(), StoreError> {
        let content = serde_json::to_string(session)?;
        *self.slot.lock().map_err(|_| Self::poisoned())? = Some(content);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Option<GenerationSession>, StoreError> {
        let content = self.slot.lock().map_err(|_| Self::poisoned())?.clone();
        match content {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().map_err(|_| Self::poisoned())? = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
