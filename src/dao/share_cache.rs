//! Local JSON cache of share codes.
//!
//! The file is advisory: a missing file means no codes, an unreadable or
//! corrupt one is logged and discarded.

use std::{io::ErrorKind, path::PathBuf, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Game a share code points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    /// Shared game.
    pub game_id: Uuid,
    /// When the code was issued.
    pub created_at: SystemTime,
}

/// Share codes kept in memory and mirrored to a JSON file.
#[derive(Debug)]
pub struct ShareCache {
    path: PathBuf,
    records: RwLock<IndexMap<String, ShareRecord>>,
}

impl ShareCache {
    /// Load the cache stored at `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<IndexMap<String, ShareRecord>>(&contents)
            {
                Ok(records) => {
                    debug!(path = %path.display(), count = records.len(), "loaded share codes");
                    records
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "share cache is corrupt; discarding it"
                    );
                    IndexMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => IndexMap::new(),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read share cache; starting empty"
                );
                IndexMap::new()
            }
        };

        Self {
            path,
            records: RwLock::new(records),
        }
    }

    /// Game behind `code`, if known.
    pub async fn resolve(&self, code: &str) -> Option<ShareRecord> {
        self.records.read().await.get(code).cloned()
    }

    /// Code for `game_id`, issuing a fresh one from `generate` on first use.
    ///
    /// Lookup and issue share one write lock, so concurrent callers get the
    /// same code. Generated codes that are already taken are drawn again.
    pub async fn code_or_issue(
        &self,
        game_id: Uuid,
        mut generate: impl FnMut() -> String,
    ) -> String {
        let mut records = self.records.write().await;
        if let Some((code, _)) = records.iter().find(|(_, record)| record.game_id == game_id) {
            return code.clone();
        }

        let code = loop {
            let candidate = generate();
            if !records.contains_key(&candidate) {
                break candidate;
            }
        };
        records.insert(
            code.clone(),
            ShareRecord {
                game_id,
                created_at: SystemTime::now(),
            },
        );
        self.persist(&records).await;
        info!(game_id = %game_id, %code, "share code issued");
        code
    }

    /// Forget every code pointing at `game_id`.
    pub async fn remove_game(&self, game_id: Uuid) {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.game_id != game_id);
        if records.len() != before {
            self.persist(&records).await;
        }
    }

    async fn persist(&self, records: &IndexMap<String, ShareRecord>) {
        let contents = match serde_json::to_string_pretty(records) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(error = %err, "failed to encode share cache");
                return;
            }
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(err) = fs::create_dir_all(parent).await
        {
            warn!(path = %parent.display(), error = %err, "failed to create share cache directory");
            return;
        }
        if let Err(err) = fs::write(&self.path, contents).await {
            warn!(path = %self.path.display(), error = %err, "failed to write share cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("old-heck-{name}-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let cache = ShareCache::load(temp_path("missing")).await;
        assert!(cache.resolve("ABCDEFGH").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_discarded() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not json").await.unwrap();
        let cache = ShareCache::load(&path).await;
        assert!(cache.resolve("anything").await.is_none());
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn codes_survive_a_reload() {
        let path = temp_path("reload");
        let game_id = Uuid::new_v4();
        let cache = ShareCache::load(&path).await;
        let code = cache.code_or_issue(game_id, || "AbCd1234".into()).await;
        assert_eq!(code, "AbCd1234");

        let reloaded = ShareCache::load(&path).await;
        assert_eq!(reloaded.resolve("AbCd1234").await.map(|r| r.game_id), Some(game_id));

        reloaded.remove_game(game_id).await;
        assert!(reloaded.resolve("AbCd1234").await.is_none());
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn taken_codes_are_drawn_again() {
        let path = temp_path("taken");
        let cache = ShareCache::load(&path).await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        cache.code_or_issue(first, || "AAAA1111".into()).await;

        let mut draws = ["AAAA1111", "BBBB2222"].into_iter().map(String::from);
        let code = cache
            .code_or_issue(second, || draws.next().unwrap())
            .await;
        assert_eq!(code, "BBBB2222");
        assert_eq!(cache.resolve("AAAA1111").await.map(|r| r.game_id), Some(first));

        let again = cache
            .code_or_issue(first, || panic!("existing code must be reused"))
            .await;
        assert_eq!(again, "AAAA1111");
        let _ = fs::remove_file(&path).await;
    }
}
