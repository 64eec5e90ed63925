//! File family (§6): `GET`, `LS`, `STAT`, `PSTAT`. A thin wire wrapper
//! around the `FileService` collaborator — no domain rules live here, only
//! the reply shape each verb promises.

use crate::args::Args;
use host_core::HostResult;
use host_domain::FileService;
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    files: &Arc<dyn FileService>,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "GET" => get(args, files).await,
        "LS" => list(args, files).await,
        "STAT" => stat(args, files).await,
        "PSTAT" => pstat(args, files).await,
        _ => return None,
    };
    Some(result)
}

async fn get(args: &mut Args<'_>, files: &Arc<dyn FileService>) -> HostResult<Value> {
    let path = args.string()?;
    Ok(match files.read(&path).await? {
        Some(content) => Value::String(String::from_utf8_lossy(&content).into_owned()),
        None => Value::Null,
    })
}

async fn list(args: &mut Args<'_>, files: &Arc<dyn FileService>) -> HostResult<Value> {
    let path = args.string()?;
    let names = files.list(&path).await?;
    Ok(Value::from(names))
}

async fn stat(args: &mut Args<'_>, files: &Arc<dyn FileService>) -> HostResult<Value> {
    let path = args.string()?;
    Ok(match files.stat(&path).await? {
        Some(meta) => {
            let mut map = std::collections::BTreeMap::new();
            map.insert("size".to_string(), Value::Integer(meta.size as i64));
            map.insert("directory".to_string(), Value::bool(meta.is_directory));
            Value::Map(map)
        }
        None => Value::Null,
    })
}

/// `PSTAT path` (§6): ownership/management metadata, as opposed to `STAT`'s
/// size/kind — distinct replies because a caller checking who owns a
/// directory shouldn't have to also ask whether it exists as a file.
async fn pstat(args: &mut Args<'_>, files: &Arc<dyn FileService>) -> HostResult<Value> {
    let path = args.string()?;
    let owner = files.owner_of(&path).await?;
    let managed = files.managed_by(&path).await?;
    let mut map = std::collections::BTreeMap::new();
    map.insert("owner".to_string(), owner.map(Value::String).unwrap_or(Value::Null));
    map.insert("managed".to_string(), managed.map(Value::Integer).unwrap_or(Value::Null));
    Ok(Value::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use host_domain::MemoryFileService;

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[tokio::test]
    async fn get_after_write_round_trips() {
        let files: Arc<dyn FileService> = Arc::new(MemoryFileService::new());
        files.write("games/0001/turn.log", b"hello").await.unwrap();

        let raw = args(&["games/0001/turn.log"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("GET", &mut a, &files).await.unwrap().unwrap();
        assert_eq!(reply, Value::String("hello".to_string()));
    }

    #[tokio::test]
    async fn ls_lists_direct_children_only() {
        let files: Arc<dyn FileService> = Arc::new(MemoryFileService::new());
        files.write("games/0001/turn.log", b"a").await.unwrap();
        files.write("games/0001/spec.rst", b"b").await.unwrap();
        files.write("games/0001/sub/deep.txt", b"c").await.unwrap();

        let raw = args(&["games/0001"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("LS", &mut a, &files).await.unwrap().unwrap();
        match reply {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stat_on_missing_path_is_null() {
        let files: Arc<dyn FileService> = Arc::new(MemoryFileService::new());
        let raw = args(&["nope"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("STAT", &mut a, &files).await.unwrap().unwrap();
        assert_eq!(reply, Value::Null);
    }
}
