//! Tool Catalog operations (§4.10): the four parallel catalogs (host,
//! master, shiplist, generic/"tool") and the difficulty heuristic that
//! derives a score from a tool's config file.
//!
//! §4.10's "kind (alphanumeric, non-empty)" charset rule applies to the
//! wire-level catalog tag (`HOST`/`MASTER`/`SHIPLIST`/`TOOL`) before it is
//! parsed into a [`ToolKind`]; by the time a `ToolKind` reaches this module
//! it is already one of four valid variants, so there is nothing left here
//! to validate against that rule.

use crate::collaborators::FileService;
use host_core::{HostError, HostResult};
use host_store::{GameStoreView, Tool, ToolKind};
use std::sync::Arc;

pub struct ToolCatalog {
    store: Arc<GameStoreView>,
    host_files: Arc<dyn FileService>,
}

impl ToolCatalog {
    pub fn new(store: Arc<GameStoreView>, host_files: Arc<dyn FileService>) -> Self {
        Self { store, host_files }
    }

    /// (§4.10). The first tool added to a catalog becomes its default.
    pub async fn add(&self, kind: ToolKind, tool: Tool) -> HostResult<()> {
        validate_id(&tool.id)?;
        self.validate_path(&tool).await?;

        let is_first = self.store.list_tools(kind).await?.is_empty();
        self.store.put_tool(&tool).await?;
        if is_first {
            self.store.set_default_tool(kind, &tool.id).await?;
        }
        Ok(())
    }

    pub async fn get(&self, kind: ToolKind, id: &str) -> HostResult<Tool> {
        self.store
            .get_tool(kind, id)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("tool {id:?} ({kind:?})")))
    }

    pub async fn list(&self, kind: ToolKind) -> HostResult<Vec<Tool>> {
        self.store.list_tools(kind).await
    }

    pub async fn get_default(&self, kind: ToolKind) -> HostResult<Option<Tool>> {
        match self.store.get_default_tool(kind).await? {
            Some(id) => self.store.get_tool(kind, &id).await,
            None => Ok(None),
        }
    }

    /// (§4.10 `remove`). Removing the catalog's default leaves it unset; the
    /// next `add` will re-claim it.
    pub async fn remove(&self, kind: ToolKind, id: &str) -> HostResult<()> {
        if !self.store.remove_tool(kind, id).await? {
            return Err(HostError::NotFound(format!("tool {id:?} ({kind:?})")));
        }
        Ok(())
    }

    pub async fn set_default(&self, kind: ToolKind, id: &str) -> HostResult<()> {
        self.get(kind, id).await?;
        self.store.set_default_tool(kind, id).await
    }

    /// (§4.10 `copy`). Full metadata copy under a new id; does not alter
    /// `dst`'s default-ness.
    pub async fn copy(&self, kind: ToolKind, src: &str, dst: &str) -> HostResult<()> {
        validate_id(dst)?;
        let mut tool = self.get(kind, src).await?;
        tool.id = dst.to_string();
        if self.store.get_tool(kind, dst).await?.is_some() {
            return Err(HostError::Conflict(format!("tool {dst:?} already exists")));
        }
        self.store.put_tool(&tool).await
    }

    /// (§4.10): set, clear, or recompute a tool's difficulty.
    pub async fn set_difficulty(&self, kind: ToolKind, id: &str, difficulty: Option<u32>) -> HostResult<()> {
        let mut tool = self.get(kind, id).await?;
        tool.difficulty = difficulty;
        self.store.put_tool(&tool).await
    }

    /// Reads the tool's config file through the host-file service and derives
    /// a 0..250 difficulty from its `planet*` density keys, then persists it.
    pub async fn compute_difficulty(&self, kind: ToolKind, id: &str) -> HostResult<u32> {
        let mut tool = self.get(kind, id).await?;
        let Some(path) = tool.path.as_ref() else {
            return Err(HostError::BadRequest(format!("tool {id:?} has no config path")));
        };
        let bytes = self
            .host_files
            .read(path)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("config file {path:?}")))?;
        let text = String::from_utf8_lossy(&bytes);

        let density_sum: f64 = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim()))
            .filter(|(key, _)| key.starts_with("planet"))
            .filter_map(|(_, value)| value.parse::<f64>().ok())
            .sum();

        let difficulty = density_sum.round().clamp(0.0, 250.0) as u32;
        tool.difficulty = Some(difficulty);
        self.store.put_tool(&tool).await?;
        Ok(difficulty)
    }

    async fn validate_path(&self, tool: &Tool) -> HostResult<()> {
        match (&tool.path, &tool.executable) {
            (Some(path), Some(_)) if !path.is_empty() => {
                if !self.host_files.exists(path).await? {
                    return Err(HostError::NotFound(format!("tool path {path:?} does not exist")));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn validate_id(id: &str) -> HostResult<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(HostError::BadRequest(format!(
            "tool id {id:?} must be non-empty alphanumeric ASCII"
        )));
    }
    Ok(())
}
