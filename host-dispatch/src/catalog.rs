//! Tool-catalog family (§4.8 "Per-family prefix scheme", §4.10): `HOSTADD`,
//! `MASTERADD`, `SHIPLISTADD`, `TOOLADD` and their `GET`/`LIST`/`REMOVE`/
//! `SETDEFAULT`/`COPY`/`DIFFICULTY` siblings all route through this one
//! handler, parameterized by which of the four catalogs the verb's prefix
//! names.

use crate::args::Args;
use host_core::{HostError, HostResult};
use host_domain::ToolCatalog;
use host_store::{Tool, ToolKind};
use host_wire::Value;
use std::sync::Arc;

const PREFIXES: &[(&str, ToolKind)] = &[
    ("HOST", ToolKind::Host),
    ("MASTER", ToolKind::Master),
    ("SHIPLIST", ToolKind::Shiplist),
    ("TOOL", ToolKind::Generic),
];

pub async fn try_dispatch(verb: &str, args: &mut Args<'_>, catalog: &Arc<ToolCatalog>) -> Option<HostResult<Value>> {
    let (kind, suffix) = PREFIXES.iter().find_map(|(prefix, kind)| {
        verb.strip_prefix(prefix).map(|suffix| (*kind, suffix))
    })?;
    Some(dispatch(suffix, args, catalog, kind).await)
}

async fn dispatch(suffix: &str, args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    match suffix {
        "ADD" => add(args, catalog, kind).await,
        "GET" => get(args, catalog, kind).await,
        "LIST" => list(args, catalog, kind).await,
        "REMOVE" => remove(args, catalog, kind).await,
        "SETDEFAULT" => set_default(args, catalog, kind).await,
        "COPY" => copy(args, catalog, kind).await,
        "DIFFICULTY" => difficulty(args, catalog, kind).await,
        _ => Err(HostError::BadRequest(format!("unknown catalog verb suffix {suffix:?}"))),
    }
}

async fn add(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let id = args.string()?;
    let path = args.string()?;
    let executable = args.string()?;
    let tool = Tool {
        id,
        kind,
        path: if path.is_empty() { None } else { Some(path) },
        executable: if executable.is_empty() { None } else { Some(executable) },
        description: if args.is_empty() { String::new() } else { args.string()? },
        difficulty: None,
        extra_files_restricted: false,
    };
    catalog.add(kind, tool).await?;
    Ok(Value::ok())
}

async fn get(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let id = args.string()?;
    let tool = catalog.get(kind, &id).await?;
    Ok(tool_to_value(&tool))
}

async fn list(_args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let tools = catalog.list(kind).await?;
    Ok(Value::Array(tools.iter().map(tool_to_value).collect()))
}

async fn remove(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let id = args.string()?;
    catalog.remove(kind, &id).await?;
    Ok(Value::ok())
}

async fn set_default(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let id = args.string()?;
    catalog.set_default(kind, &id).await?;
    Ok(Value::ok())
}

async fn copy(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let src = args.string()?;
    let dst = args.string()?;
    catalog.copy(kind, &src, &dst).await?;
    Ok(Value::ok())
}

async fn difficulty(args: &mut Args<'_>, catalog: &Arc<ToolCatalog>, kind: ToolKind) -> HostResult<Value> {
    let id = args.string()?;
    if args.is_empty() {
        let difficulty = catalog.compute_difficulty(kind, &id).await?;
        return Ok(Value::Integer(difficulty as i64));
    }
    let raw = args.string()?;
    let value = if raw.is_empty() { None } else { Some(raw.parse().map_err(|_| HostError::BadRequest(format!("bad difficulty {raw}")))?) };
    catalog.set_difficulty(kind, &id, value).await?;
    Ok(Value::ok())
}

fn tool_to_value(tool: &Tool) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("id".to_string(), Value::String(tool.id.clone()));
    map.insert("path".to_string(), tool.path.clone().map(Value::String).unwrap_or(Value::Null));
    map.insert("executable".to_string(), tool.executable.clone().map(Value::String).unwrap_or(Value::Null));
    map.insert("description".to_string(), Value::String(tool.description.clone()));
    map.insert(
        "difficulty".to_string(),
        tool.difficulty.map(|d| Value::Integer(d as i64)).unwrap_or(Value::Null),
    );
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use host_domain::MemoryFileService;
    use host_store::{GameStoreView, MemoryStore};

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn catalog() -> Arc<ToolCatalog> {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        Arc::new(ToolCatalog::new(store, Arc::new(MemoryFileService::new())))
    }

    #[tokio::test]
    async fn hostadd_routes_to_host_kind() {
        let catalog = catalog();
        let raw = args(&["vga", "", "", "VGA Planets"]);
        let mut a = Args::new(&raw);
        try_dispatch("HOSTADD", &mut a, &catalog).await.unwrap().unwrap();
        let tools = catalog.list(ToolKind::Host).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].id, "vga");
    }

    #[tokio::test]
    async fn masteradd_and_shiplistadd_route_to_distinct_kinds() {
        let catalog = catalog();
        let raw = args(&["m1", "", ""]);
        let mut a = Args::new(&raw);
        try_dispatch("MASTERADD", &mut a, &catalog).await.unwrap().unwrap();
        let raw = args(&["s1", "", ""]);
        let mut a = Args::new(&raw);
        try_dispatch("SHIPLISTADD", &mut a, &catalog).await.unwrap().unwrap();
        assert_eq!(catalog.list(ToolKind::Master).await.unwrap().len(), 1);
        assert_eq!(catalog.list(ToolKind::Shiplist).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unrelated_verb_is_not_claimed() {
        let catalog = catalog();
        let raw = args(&[]);
        let mut a = Args::new(&raw);
        assert!(try_dispatch("PING", &mut a, &catalog).await.is_none());
    }
}
