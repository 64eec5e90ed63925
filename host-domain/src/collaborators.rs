//! The EXTERNAL COLLABORATORS (§1): file services, mail queue, forum, and
//! session router. The core only consumes the interfaces below; the actual
//! services live outside this repository. Each trait is intentionally thin —
//! exactly the operations §4 calls out — and ships a `Memory*` test double
//! so domain-operation tests don't need a live collaborator.

use async_trait::async_trait;
use host_core::HostResult;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One of the two file-hierarchy collaborators (§1): host-side files (engine
/// input/output, tool binaries) or user home directories. Both speak the
/// same narrow interface; which root a given path resolves under is the
/// caller's concern, not this trait's.
#[async_trait]
pub trait FileService: Send + Sync {
    async fn write(&self, path: &str, content: &[u8]) -> HostResult<()>;
    async fn read(&self, path: &str) -> HostResult<Option<Vec<u8>>>;
    async fn exists(&self, path: &str) -> HostResult<bool>;
    /// Returns the owning user id recorded for a directory, if any (used by
    /// the managed-directory validation in §4.5).
    async fn owner_of(&self, path: &str) -> HostResult<Option<String>>;
    /// Reads the "managed by game N" property on a directory (§4.5).
    async fn managed_by(&self, path: &str) -> HostResult<Option<i64>>;
    async fn set_managed_by(&self, path: &str, game: Option<i64>) -> HostResult<()>;
    /// Entry names directly under `path` (the wire `LS` verb, §6).
    async fn list(&self, path: &str) -> HostResult<Vec<String>>;
    /// Size and kind of the entry at `path`, if it exists (the wire `STAT` verb, §6).
    async fn stat(&self, path: &str) -> HostResult<Option<FileMeta>>;
}

/// `STAT`'s reply shape (§6): big enough to tell a caller whether a listed
/// name is itself a directory worth recursing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub is_directory: bool,
}

/// Outbound notification queue (§1). Fire-and-forget from the core's
/// perspective; delivery guarantees live entirely in the collaborator.
#[async_trait]
pub trait MailQueue: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> HostResult<()>;
}

/// Per-game discussion group management (§1). The core only ever opens or
/// closes a group in step with a game's lifecycle; rendering and moderation
/// are entirely out of scope (§1 Non-goals).
#[async_trait]
pub trait Forum: Send + Sync {
    async fn open_group(&self, game: i64, name: &str) -> HostResult<()>;
    async fn close_group(&self, game: i64) -> HostResult<()>;
}

/// Closes web sessions tied to a game whenever its state changes (§1).
#[async_trait]
pub trait SessionRouter: Send + Sync {
    async fn close_game_sessions(&self, game: i64) -> HostResult<()>;
}

/// The scheduler worker's externally-visible `handleGameChange` (§4.3),
/// seen from the domain layer's side: any operation that changes a game's
/// readiness (join, resign, turn submission, schedule edit) reports it here.
/// `host-scheduler` implements this trait; `host-domain` only depends on the
/// trait so the two crates don't form a cycle.
#[async_trait]
pub trait ScheduleNotifier: Send + Sync {
    async fn handle_game_change(&self, game: i64);
}

#[derive(Default)]
pub struct NullScheduleNotifier;

#[async_trait]
impl ScheduleNotifier for NullScheduleNotifier {
    async fn handle_game_change(&self, game: i64) {
        log::debug!("[notifier] (noop) game {game} changed");
    }
}

/// In-memory test double for `FileService`, used by domain-operation unit
/// tests and the command-dispatcher integration tests alike.
#[derive(Default)]
pub struct MemoryFileService {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    owners: Mutex<BTreeMap<String, String>>,
    managed: Mutex<BTreeMap<String, i64>>,
}

impl MemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test setup helper: pre-seed a directory as existing and owned by `user`.
    pub fn seed_directory(&self, path: &str, owner: &str) {
        self.owners.lock().unwrap().insert(path.to_string(), owner.to_string());
        self.files.lock().unwrap().entry(path.to_string()).or_default();
    }
}

#[async_trait]
impl FileService for MemoryFileService {
    async fn write(&self, path: &str, content: &[u8]) -> HostResult<()> {
        self.files.lock().unwrap().insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> HostResult<Option<Vec<u8>>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn exists(&self, path: &str) -> HostResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(path) || self.owners.lock().unwrap().contains_key(path))
    }

    async fn owner_of(&self, path: &str) -> HostResult<Option<String>> {
        Ok(self.owners.lock().unwrap().get(path).cloned())
    }

    async fn managed_by(&self, path: &str) -> HostResult<Option<i64>> {
        Ok(self.managed.lock().unwrap().get(path).copied())
    }

    async fn set_managed_by(&self, path: &str, game: Option<i64>) -> HostResult<()> {
        let mut managed = self.managed.lock().unwrap();
        match game {
            Some(g) => {
                managed.insert(path.to_string(), g);
            }
            None => {
                managed.remove(path);
            }
        }
        Ok(())
    }

    async fn list(&self, path: &str) -> HostResult<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.lock().unwrap();
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn stat(&self, path: &str) -> HostResult<Option<FileMeta>> {
        if let Some(content) = self.files.lock().unwrap().get(path) {
            return Ok(Some(FileMeta { size: content.len() as u64, is_directory: false }));
        }
        if self.owners.lock().unwrap().contains_key(path) {
            return Ok(Some(FileMeta { size: 0, is_directory: true }));
        }
        Ok(None)
    }
}

#[derive(Default)]
pub struct NullMailQueue;

#[async_trait]
impl MailQueue for NullMailQueue {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> HostResult<()> {
        log::debug!("[mail] (discarded) to={to} subject={subject}");
        Ok(())
    }
}

#[derive(Default)]
pub struct NullForum;

#[async_trait]
impl Forum for NullForum {
    async fn open_group(&self, game: i64, name: &str) -> HostResult<()> {
        log::debug!("[forum] (noop) open group for game {game} ({name})");
        Ok(())
    }

    async fn close_group(&self, game: i64) -> HostResult<()> {
        log::debug!("[forum] (noop) close group for game {game}");
        Ok(())
    }
}

#[derive(Default)]
pub struct NullSessionRouter;

#[async_trait]
impl SessionRouter for NullSessionRouter {
    async fn close_game_sessions(&self, game: i64) -> HostResult<()> {
        log::debug!("[router] (noop) close sessions for game {game}");
        Ok(())
    }
}
