//! Player family (§4.5, §6): `PLAYERJOIN`, `PLAYERSUBST`, `PLAYERRESIGN`,
//! `PLAYERADD` (grant access), `PLAYERLS`, `PLAYERSETDIR`, `PLAYERCHECKFILE`.

use crate::args::Args;
use host_auth::Session;
use host_core::{HostResult, MAX_SLOTS};
use host_domain::{FileDecision, PlayerDomain};
use host_store::GameStoreView;
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    session: &Session,
    players: &Arc<PlayerDomain>,
    store: &Arc<GameStoreView>,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "PLAYERJOIN" => join(args, session, players).await,
        "PLAYERSUBST" => substitute(args, session, players).await,
        "PLAYERRESIGN" => resign(args, session, players).await,
        "PLAYERADD" => grant_access(args, session, players).await,
        "PLAYERLS" => list(args, store).await,
        "PLAYERSETDIR" => set_directory(args, players).await,
        "PLAYERCHECKFILE" => check_file(args, players).await,
        _ => return None,
    };
    Some(result)
}

async fn join(args: &mut Args<'_>, session: &Session, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let slot = args.u16()?;
    let user = args.string()?;
    players.join(session, game, slot, &user).await?;
    Ok(Value::ok())
}

async fn substitute(args: &mut Args<'_>, session: &Session, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let slot = args.u16()?;
    let user = args.string()?;
    players.substitute(session, game, slot, &user).await?;
    Ok(Value::ok())
}

async fn resign(args: &mut Args<'_>, session: &Session, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let slot = args.u16()?;
    let user = args.string()?;
    players.resign(session, game, slot, &user).await?;
    Ok(Value::ok())
}

async fn grant_access(args: &mut Args<'_>, session: &Session, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let user = args.string()?;
    players.grant_access(session, game, &user).await?;
    Ok(Value::ok())
}

/// `PLAYERLS gid [ALL]` (§6): flat array of `(slot, info)` pairs. Without
/// `ALL`, unoccupied slots are omitted.
async fn list(args: &mut Args<'_>, store: &Arc<GameStoreView>) -> HostResult<Value> {
    let game = args.i64()?;
    let show_all = !args.is_empty() && args.string()?.eq_ignore_ascii_case("ALL");
    let slots = store.get_slots(game, MAX_SLOTS).await?;
    let mut out = Vec::new();
    for slot in slots.iter().filter(|s| show_all || s.is_occupied()) {
        out.push(Value::Integer(slot.number as i64));
        let mut map = std::collections::BTreeMap::new();
        map.insert("chain".to_string(), Value::from(slot.chain.clone()));
        map.insert("state".to_string(), Value::Integer(slot.state.0 as i64));
        out.push(Value::Map(map));
    }
    Ok(Value::Array(out))
}

async fn set_directory(args: &mut Args<'_>, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let user = args.string()?;
    let new_path = args.string()?;
    let previous = if args.is_empty() { None } else { Some(args.string()?) };
    players
        .set_managed_directory(game, &user, &new_path, previous.as_deref())
        .await?;
    Ok(Value::ok())
}

async fn check_file(args: &mut Args<'_>, players: &Arc<PlayerDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let user = args.string()?;
    let name = args.string()?;
    let directory = args.string()?;
    let managed = if args.is_empty() { None } else { Some(args.string()?) };
    let decision = players.check_file(game, &user, &name, &directory, managed.as_deref()).await?;
    Ok(match decision {
        FileDecision::Allow => Value::String("allow".to_string()),
        FileDecision::Refuse => Value::String("refuse".to_string()),
        FileDecision::Stale => Value::String("stale".to_string()),
        FileDecision::Turn(slot) => Value::Array(vec![Value::String("turn".to_string()), Value::Integer(slot as i64)]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use host_domain::{MemoryFileService, NullScheduleNotifier};
    use host_store::{GameState, GameType, MemoryStore, User};

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn harness() -> (Arc<PlayerDomain>, Arc<GameStoreView>) {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let players = Arc::new(PlayerDomain::new(
            store.clone(),
            Arc::new(MemoryFileService::new()),
            Arc::new(NullScheduleNotifier),
        ));
        (players, store)
    }

    #[tokio::test]
    async fn playerjoin_then_playerls_shows_occupant() {
        let (players, store) = harness();
        store
            .put_game(&host_store::Game {
                id: 1,
                state: GameState::Joining,
                game_type: GameType::Public,
                ..Default::default()
            })
            .await
            .unwrap();
        store.put_user(&User { id: "ua".to_string(), allow_join: true, ..Default::default() }).await.unwrap();

        let session = Session::admin();
        let raw = args(&["1", "3", "ua"]);
        let mut a = Args::new(&raw);
        try_dispatch("PLAYERJOIN", &mut a, &session, &players, &store).await.unwrap().unwrap();

        let raw = args(&["1"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("PLAYERLS", &mut a, &session, &players, &store).await.unwrap().unwrap();
        match reply {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }
}
