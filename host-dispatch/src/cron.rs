//! Cron family (§4.3 externally-visible operations, §6): `CRONGET`,
//! `CRONLIST`, `CRONKICK`, `CRONSUSPEND`. All admin-only — these expose
//! the scheduler's internal state and override its decisions.

use crate::args::Args;
use host_auth::Session;
use host_core::HostResult;
use host_scheduler::{EventAction, GameEvent, Scheduler};
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    session: &Session,
    scheduler: &Arc<Scheduler>,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "CRONGET" => get(args, scheduler).await,
        "CRONLIST" => list(args, scheduler).await,
        "CRONKICK" => kick(args, session, scheduler).await,
        "CRONSUSPEND" => suspend(args, session, scheduler).await,
        _ => return None,
    };
    Some(result)
}

async fn get(args: &mut Args<'_>, scheduler: &Arc<Scheduler>) -> HostResult<Value> {
    let game = args.i64()?;
    Ok(match scheduler.get_game_event(game).await {
        Some(event) => event_to_value(&event),
        None => Value::Null,
    })
}

/// `CRONLIST [LIMIT n]` (§6).
async fn list(args: &mut Args<'_>, scheduler: &Arc<Scheduler>) -> HostResult<Value> {
    let pairs = args.remaining_pairs()?;
    let limit = crate::args::find_opt(&pairs, "LIMIT")
        .map(|v| v.parse::<usize>().map_err(|_| host_core::HostError::BadRequest("LIMIT must be an integer".into())))
        .transpose()?;
    let mut events = scheduler.list_game_events().await;
    events.sort_by_key(|e| e.due);
    if let Some(limit) = limit {
        events.truncate(limit);
    }
    Ok(Value::Array(events.iter().map(event_to_value).collect()))
}

async fn kick(args: &mut Args<'_>, session: &Session, scheduler: &Arc<Scheduler>) -> HostResult<Value> {
    session.check_admin()?;
    let game = args.i64()?;
    scheduler.kick(game).await;
    Ok(Value::Integer(1))
}

async fn suspend(args: &mut Args<'_>, session: &Session, scheduler: &Arc<Scheduler>) -> HostResult<Value> {
    session.check_admin()?;
    let at = args.i64()?;
    scheduler.suspend_until(at).await;
    Ok(Value::ok())
}

fn event_to_value(event: &GameEvent) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("game".to_string(), Value::Integer(event.game));
    map.insert(
        "action".to_string(),
        Value::String(
            match event.action {
                EventAction::Master => "master",
                EventAction::Host => "host",
            }
            .to_string(),
        ),
    );
    map.insert("time".to_string(), Value::Integer(event.due));
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use host_arbiter::Arbiter;
    use host_core::FixedClock;
    use host_domain::{GameDomain, MemoryFileService, NullForum, NullScheduleNotifier, NullSessionRouter, ToolCatalog};
    use host_store::{GameStoreView, MemoryStore};
    use host_subprocess::ProcessRunner;

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn harness() -> Arc<Scheduler> {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let games = Arc::new(GameDomain::new(
            store.clone(),
            Arc::new(NullForum),
            Arc::new(NullSessionRouter),
            Arc::new(NullScheduleNotifier),
        ));
        let catalog = Arc::new(ToolCatalog::new(store.clone(), Arc::new(MemoryFileService::new())));
        Arc::new(Scheduler::new(
            store,
            Arc::new(Arbiter::new()),
            Arc::new(ProcessRunner::new()),
            Arc::new(FixedClock::new(0)),
            games,
            catalog,
            Arc::new(tokio::sync::Mutex::new(())),
        ))
    }

    #[tokio::test]
    async fn cronkick_requires_admin() {
        let scheduler = harness();
        let regular = Session::as_user("ua");
        let raw = args(&["1"]);
        let mut a = Args::new(&raw);
        let err = try_dispatch("CRONKICK", &mut a, &regular, &scheduler).await.unwrap().unwrap_err();
        assert!(matches!(err, host_core::HostError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cronget_on_unscheduled_game_is_null() {
        let scheduler = harness();
        let admin = Session::admin();
        let raw = args(&["99"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("CRONGET", &mut a, &admin, &scheduler).await.unwrap().unwrap();
        assert_eq!(reply, Value::Null);
    }
}
