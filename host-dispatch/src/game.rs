//! Game family (§4.4, §6): `NEWGAME`, `GAMECLONE`, `GAMESETSTATE`,
//! `GAMESETTYPE`, `GAMESETNAME`, `GAMELIST`, `GAMESTAT`, `GAMEGETCONFIG`,
//! `GAMESETCONFIG`, `GAMEADDTOOL`, `GAMEREMOVETOOL`, `GAMEPERMS`.

use crate::args::Args;
use host_arbiter::{Arbiter, Mode};
use host_auth::Session;
use host_core::HostResult;
use host_domain::{GameDomain, GameFilter, ToolCatalog};
use host_store::{Game, GameState, GameType, ToolKind};
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    session: &Session,
    games: &Arc<GameDomain>,
    catalog: &Arc<ToolCatalog>,
    arbiter: &Arc<Arbiter>,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "NEWGAME" => new_game(games).await,
        "GAMECLONE" => clone_game(args, session, games, arbiter).await,
        "GAMESETSTATE" => set_state(args, games).await,
        "GAMESETTYPE" => set_type(args, games).await,
        "GAMESETNAME" => set_name(args, games).await,
        "GAMELIST" => list(args, session, games).await,
        "GAMESTAT" => stat(args, games).await,
        "GAMEGETCONFIG" => get_config(args, games).await,
        "GAMESETCONFIG" => set_config(args, games, catalog).await,
        "GAMEADDTOOL" => add_tool(args, games).await,
        "GAMEREMOVETOOL" => remove_tool(args, games, catalog).await,
        "GAMEPERMS" => perms(args, games).await,
        _ => return None,
    };
    Some(result)
}

async fn new_game(games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = games.create().await?;
    Ok(Value::Integer(id))
}

async fn clone_game(args: &mut Args<'_>, session: &Session, games: &Arc<GameDomain>, arbiter: &Arc<Arbiter>) -> HostResult<Value> {
    session.check_admin()?;
    let source = args.i64()?;
    // Hold the source game in simple mode for the clone (§4.1): this blocks a
    // concurrent host-mode acquisition for the duration, so the snapshot we
    // read can never straddle a scheduler-driven mutation. Holding simple
    // mode also means host mode cannot already be held, so the "source is
    // mid-run" case `GameDomain::clone_game` branches on never triggers here.
    let _guard = arbiter.acquire(source, Mode::Simple).await;
    let id = games.clone_game(source, false).await?;
    Ok(Value::Integer(id))
}

async fn set_state(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let state = parse_state(&args.string()?)?;
    games.set_state(id, state).await?;
    Ok(Value::ok())
}

async fn set_type(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let kind = parse_type(&args.string()?)?;
    games.set_type(id, kind).await?;
    Ok(Value::ok())
}

async fn set_name(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let name = args.string()?;
    games.set_name(id, name).await?;
    Ok(Value::ok())
}

async fn list(args: &mut Args<'_>, session: &Session, games: &Arc<GameDomain>) -> HostResult<Value> {
    let mut filter = GameFilter::default();
    for (key, value) in args.remaining_pairs()? {
        match key.to_ascii_uppercase().as_str() {
            "STATE" => filter.state = Some(parse_state(&value)?),
            "TYPE" => filter.game_type = Some(parse_type(&value)?),
            "USER" => filter.user = Some(value),
            "HOST" => filter.host = Some(value),
            "MASTER" => filter.master = Some(value),
            "SHIPLIST" => filter.shiplist = Some(value),
            "TOOL" => filter.tool = Some(value),
            other => return Err(host_core::HostError::BadRequest(format!("unknown GAMELIST filter {other:?}"))),
        }
    }
    let ids = games.list(session, &filter).await?;
    Ok(Value::from(ids))
}

async fn stat(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let game = games.get(id).await?;
    Ok(game_to_value(&game))
}

async fn get_config(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let key = args.string()?;
    let value = games.get_config(id, &key).await?;
    Ok(Value::String(value))
}

async fn set_config(args: &mut Args<'_>, games: &Arc<GameDomain>, catalog: &Arc<ToolCatalog>) -> HostResult<Value> {
    let id = args.i64()?;
    let assignments = args.remaining_pairs()?;

    // `GameDomain::set_config` takes a synchronous validator (§4.4 "atomic");
    // resolve every tool-key assignment against the catalog up front so the
    // closure itself never needs to await.
    let mut known = std::collections::HashSet::new();
    for (key, value) in &assignments {
        let kind = match key.to_ascii_lowercase().as_str() {
            "host" => Some(ToolKind::Host),
            "master" => Some(ToolKind::Master),
            "shiplist" => Some(ToolKind::Shiplist),
            _ => None,
        };
        if let Some(kind) = kind {
            if catalog.get(kind, value).await.is_ok() {
                known.insert((kind, value.clone()));
            }
        }
    }

    games
        .set_config(id, &assignments, |kind, value| known.contains(&(kind, value.to_string())))
        .await?;
    Ok(Value::ok())
}

async fn add_tool(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let kind = parse_kind(&args.string()?)?;
    let tool_id = args.string()?;
    games.add_tool(id, kind, &tool_id).await?;
    Ok(Value::ok())
}

async fn remove_tool(args: &mut Args<'_>, games: &Arc<GameDomain>, catalog: &Arc<ToolCatalog>) -> HostResult<Value> {
    let id = args.i64()?;
    let kind = parse_kind(&args.string()?)?;
    let tool_id = args.string()?;
    let exists = catalog.get(kind, &tool_id).await.is_ok();
    let removed = games.remove_tool(id, kind, &tool_id, exists).await?;
    Ok(Value::bool(removed))
}

async fn perms(args: &mut Args<'_>, games: &Arc<GameDomain>) -> HostResult<Value> {
    let id = args.i64()?;
    let user = args.string()?;
    let bits = games.permission_bits(id, &user).await?;
    let mut map = std::collections::BTreeMap::new();
    map.insert("primary".to_string(), Value::bool(bits.is_primary));
    map.insert("active".to_string(), Value::bool(bits.is_active));
    map.insert("inactive".to_string(), Value::bool(bits.is_inactive));
    map.insert("owner".to_string(), Value::bool(bits.is_owner));
    map.insert("public".to_string(), Value::bool(bits.is_public));
    Ok(Value::Map(map))
}

fn game_to_value(game: &Game) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("id".to_string(), Value::Integer(game.id));
    map.insert("name".to_string(), Value::String(game.name.clone()));
    map.insert("state".to_string(), Value::String(format!("{:?}", game.state).to_lowercase()));
    map.insert("type".to_string(), Value::String(format!("{:?}", game.game_type).to_lowercase()));
    map.insert("owner".to_string(), Value::String(game.owner.clone()));
    map.insert("directory".to_string(), Value::String(game.directory.clone()));
    map.insert("turn".to_string(), Value::Integer(game.turn));
    Value::Map(map)
}

fn parse_state(raw: &str) -> HostResult<GameState> {
    match raw.to_ascii_lowercase().as_str() {
        "preparing" => Ok(GameState::Preparing),
        "joining" => Ok(GameState::Joining),
        "running" => Ok(GameState::Running),
        "finished" => Ok(GameState::Finished),
        "deleted" => Ok(GameState::Deleted),
        other => Err(host_core::HostError::BadRequest(format!("unknown game state {other:?}"))),
    }
}

fn parse_type(raw: &str) -> HostResult<GameType> {
    match raw.to_ascii_lowercase().as_str() {
        "public" => Ok(GameType::Public),
        "unlisted" => Ok(GameType::Unlisted),
        "private" => Ok(GameType::Private),
        other => Err(host_core::HostError::BadRequest(format!("unknown game type {other:?}"))),
    }
}

fn parse_kind(raw: &str) -> HostResult<ToolKind> {
    match raw.to_ascii_uppercase().as_str() {
        "HOST" => Ok(ToolKind::Host),
        "MASTER" => Ok(ToolKind::Master),
        "SHIPLIST" => Ok(ToolKind::Shiplist),
        "TOOL" => Ok(ToolKind::Generic),
        other => Err(host_core::HostError::BadRequest(format!("unknown tool kind {other:?}"))),
    }
}
