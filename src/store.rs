//! Subscription storage
//!
//! Keeps every chat's subscriptions in `subs.json` inside the data directory.
//! The file is re-read before each operation so manual edits are picked up,
//! and rewritten through a temporary file so a crash never leaves it torn.

use crate::drill::{Language, Task};
use crate::state_machine::ChatId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub const STORE_FILE: &str = "subs.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupt subscription file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Chat {chat_id} has no {task} ({lang}) subscription")]
    NotFound {
        chat_id: ChatId,
        task: Task,
        lang: Language,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One daily drill for one chat, sent at `hour:minute` in `GMT+timezone`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubInfo {
    pub task: Task,
    pub lang: Language,
    pub hour: u32,
    pub minute: u32,
    /// Whole-hour offset from GMT
    pub timezone: i32,
}

impl SubInfo {
    /// `9:05 GMT+2`
    pub fn schedule(&self) -> String {
        format!("{}:{:02} GMT{:+}", self.hour, self.minute, self.timezone)
    }

    pub fn is(&self, task: Task, lang: Language) -> bool {
        self.task == task && self.lang == lang
    }
}

type Subscriptions = BTreeMap<ChatId, Vec<SubInfo>>;

/// Thread-safe handle on the subscription file
pub struct SubscriptionStore {
    path: PathBuf,
    data: Mutex<Subscriptions>,
}

impl SubscriptionStore {
    /// Open the store in `data_dir`, creating the directory and an empty
    /// file if needed
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir).map_err(io_error(dir))?;

        let store = Self {
            path: dir.join(STORE_FILE),
            data: Mutex::new(BTreeMap::new()),
        };
        if store.path.exists() {
            let chats = store.locked()?.len();
            tracing::debug!(chats, "Loaded subscriptions");
        } else {
            tracing::info!(path = %store.path.display(), "Creating new subscription storage");
            store.save(&BTreeMap::new())?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock and refresh from disk
    fn locked(&self) -> StoreResult<MutexGuard<'_, Subscriptions>> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        *data = self.load()?;
        Ok(data)
    }

    fn load(&self) -> StoreResult<Subscriptions> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(io_error(&self.path)(e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, data: &Subscriptions) -> StoreResult<()> {
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, json).map_err(io_error(&tmp))?;
        std::fs::rename(&tmp, &self.path).map_err(io_error(&self.path))?;
        Ok(())
    }

    // ==================== Subscription Operations ====================

    pub fn add_sub(&self, chat_id: ChatId, info: SubInfo) -> StoreResult<()> {
        let mut data = self.locked()?;
        tracing::info!(
            chat_id = %chat_id,
            task = %info.task,
            lang = %info.lang,
            schedule = %info.schedule(),
            "Adding subscription"
        );
        data.entry(chat_id).or_default().push(info);
        self.save(&data)
    }

    /// Remove and return the chat's subscription to `task` in `lang`
    pub fn remove_sub(&self, chat_id: ChatId, task: Task, lang: Language) -> StoreResult<SubInfo> {
        let mut data = self.locked()?;
        let not_found = || StoreError::NotFound {
            chat_id,
            task,
            lang,
        };
        let subs = data.get_mut(&chat_id).ok_or_else(not_found)?;
        let pos = subs
            .iter()
            .position(|sub| sub.is(task, lang))
            .ok_or_else(not_found)?;
        let removed = subs.remove(pos);
        if subs.is_empty() {
            data.remove(&chat_id);
        }
        self.save(&data)?;
        Ok(removed)
    }

    /// Change the chat's subscription to `task` in `lang` in place, with a
    /// single write. Returns the subscription before and after the change.
    pub fn replace_sub(
        &self,
        chat_id: ChatId,
        task: Task,
        lang: Language,
        change: impl FnOnce(&mut SubInfo),
    ) -> StoreResult<(SubInfo, SubInfo)> {
        let mut data = self.locked()?;
        let sub = data
            .get_mut(&chat_id)
            .and_then(|subs| subs.iter_mut().find(|sub| sub.is(task, lang)))
            .ok_or(StoreError::NotFound {
                chat_id,
                task,
                lang,
            })?;
        let old = sub.clone();
        change(sub);
        let new = sub.clone();
        tracing::info!(
            chat_id = %chat_id,
            task = %task,
            lang = %new.lang,
            schedule = %new.schedule(),
            "Replacing subscription"
        );
        self.save(&data)?;
        Ok((old, new))
    }

    /// Remove and return all of the chat's subscriptions
    pub fn remove_subs(&self, chat_id: ChatId) -> StoreResult<Vec<SubInfo>> {
        let mut data = self.locked()?;
        let removed = data.remove(&chat_id).unwrap_or_default();
        self.save(&data)?;
        Ok(removed)
    }

    pub fn has_sub(&self, chat_id: ChatId, task: Task, lang: Language) -> StoreResult<bool> {
        let data = self.locked()?;
        Ok(data
            .get(&chat_id)
            .is_some_and(|subs| subs.iter().any(|sub| sub.is(task, lang))))
    }

    pub fn get_subs(&self, chat_id: ChatId) -> StoreResult<Vec<SubInfo>> {
        let data = self.locked()?;
        Ok(data.get(&chat_id).cloned().unwrap_or_default())
    }

    /// Every stored subscription, ordered by chat
    pub fn all(&self) -> StoreResult<Vec<(ChatId, SubInfo)>> {
        let data = self.locked()?;
        Ok(data
            .iter()
            .flat_map(|(chat_id, subs)| subs.iter().map(|sub| (*chat_id, sub.clone())))
            .collect())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}
