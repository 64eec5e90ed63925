//! Turn family (§4.6, §6): `TRN` and `TRNMARKTEMP`.

use crate::args::{find_opt, Args};
use host_auth::Session;
use host_core::HostResult;
use host_domain::{SubmitRequest, TurnDomain};
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    session: &Session,
    turns: &Arc<TurnDomain>,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "TRN" => submit(args, session, turns).await,
        "TRNMARKTEMP" => mark_temp(args, session, turns).await,
        _ => return None,
    };
    Some(result)
}

/// `TRN blob [GAME gid] [SLOT n] [MAIL addr] [INFO s]` (§6).
async fn submit(args: &mut Args<'_>, session: &Session, turns: &Arc<TurnDomain>) -> HostResult<Value> {
    let blob = args.bytes()?;
    let pairs = args.remaining_pairs()?;
    let req = SubmitRequest {
        blob,
        game: find_opt(&pairs, "GAME").map(|v| v.parse()).transpose().map_err(|_| {
            host_core::HostError::BadRequest("GAME option must be an integer".into())
        })?,
        slot: find_opt(&pairs, "SLOT").map(|v| v.parse()).transpose().map_err(|_| {
            host_core::HostError::BadRequest("SLOT option must be an integer".into())
        })?,
        mail: find_opt(&pairs, "MAIL").map(str::to_string),
        info: find_opt(&pairs, "INFO").map(str::to_string),
    };
    let result = turns.submit(session, req).await?;
    let mut map = std::collections::BTreeMap::new();
    map.insert("status".to_string(), Value::Integer(result.status as i64));
    map.insert("output".to_string(), Value::String(result.output));
    map.insert("game".to_string(), Value::Integer(result.game));
    map.insert("slot".to_string(), Value::Integer(result.slot as i64));
    map.insert("previous".to_string(), Value::Integer(result.previous as i64));
    map.insert("user".to_string(), Value::String(result.user));
    Ok(Value::Map(map))
}

async fn mark_temp(args: &mut Args<'_>, session: &Session, turns: &Arc<TurnDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let slot = args.u16()?;
    let flag = args.bool_flag()?;
    turns.set_temporary(session, game, slot, flag).await?;
    Ok(Value::ok())
}
