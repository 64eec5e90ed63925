//! Disk-backed `FileService` (§1 EXTERNAL COLLABORATORS, §10): the two file
//! hierarchies (host-side files, user home directories) are themselves out
//! of scope — only their narrow interface is — so this is a minimal,
//! genuinely-persistent implementation rooted at a configured directory
//! rather than a faithful reproduction of either service's own tree
//! rendering. Ownership and "managed by game N" bookkeeping (§4.5), which
//! a real file-hierarchy service would track natively, is kept in a small
//! sidecar JSON index alongside the files it describes.

use async_trait::async_trait;
use host_core::{HostError, HostResult};
use host_domain::{FileMeta, FileService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    owners: BTreeMap<String, String>,
    managed: BTreeMap<String, i64>,
}

pub struct LocalFileService {
    root: PathBuf,
    index_path: PathBuf,
    index: Mutex<Index>,
}

impl LocalFileService {
    pub fn new(root: impl Into<PathBuf>) -> HostResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| HostError::BadRequest(format!("creating file-service root {root:?}: {e}")))?;
        let index_path = root.join(".hoststation-index.json");
        let index = if index_path.exists() {
            let text = std::fs::read_to_string(&index_path).unwrap_or_default();
            serde_json::from_str(&text).unwrap_or_default()
        } else {
            Index::default()
        };
        Ok(Self {
            root,
            index_path,
            index: Mutex::new(index),
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn persist_index(&self) -> HostResult<()> {
        let index = self.index.lock().expect("file-service index poisoned");
        let text = serde_json::to_string(&*index)
            .map_err(|e| HostError::BadRequest(format!("serializing file-service index: {e}")))?;
        std::fs::write(&self.index_path, text)
            .map_err(|e| HostError::BadRequest(format!("writing file-service index: {e}")))
    }
}

#[async_trait]
impl FileService for LocalFileService {
    async fn write(&self, path: &str, content: &[u8]) -> HostResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HostError::BadRequest(format!("creating {parent:?}: {e}")))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| HostError::BadRequest(format!("writing {full:?}: {e}")))
    }

    async fn read(&self, path: &str) -> HostResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::BadRequest(format!("reading {path}: {e}"))),
        }
    }

    async fn exists(&self, path: &str) -> HostResult<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await.unwrap_or(false))
    }

    async fn owner_of(&self, path: &str) -> HostResult<Option<String>> {
        Ok(self.index.lock().expect("file-service index poisoned").owners.get(path).cloned())
    }

    async fn managed_by(&self, path: &str) -> HostResult<Option<i64>> {
        Ok(self.index.lock().expect("file-service index poisoned").managed.get(path).copied())
    }

    async fn set_managed_by(&self, path: &str, game: Option<i64>) -> HostResult<()> {
        {
            let mut index = self.index.lock().expect("file-service index poisoned");
            match game {
                Some(g) => {
                    index.managed.insert(path.to_string(), g);
                }
                None => {
                    index.managed.remove(path);
                }
            }
        }
        self.persist_index()
    }

    async fn list(&self, path: &str) -> HostResult<Vec<String>> {
        let full = self.resolve(path);
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HostError::BadRequest(format!("listing {full:?}: {e}"))),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HostError::BadRequest(format!("listing {full:?}: {e}")))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with(".hoststation-") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &str) -> HostResult<Option<FileMeta>> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(Some(FileMeta {
                size: meta.len(),
                is_directory: meta.is_dir(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::BadRequest(format!("stat {path}: {e}"))),
        }
    }
}

/// Records ownership when a directory is first created (§4.5 "managed
/// directory" validates a directory is owned by the caller before letting
/// them point a game at it); `LocalFileService` itself never invents an
/// owner, so the player domain calls this explicitly via `seed_owner`.
impl LocalFileService {
    pub fn seed_owner(&self, path: &str, owner: &str) -> HostResult<()> {
        {
            let mut index = self.index.lock().expect("file-service index poisoned");
            index.owners.insert(path.to_string(), owner.to_string());
        }
        self.persist_index()
    }
}
