//! The command dispatcher (§4.8): wires wire verbs to the domain/catalog/
//! scheduler operations built in `host-domain` and `host-scheduler`, behind
//! the per-session model from `host-auth`.
//!
//! `Dispatcher::dispatch` is the whole of §4.8's numbered steps 1-6: it
//! uppercases the verb, holds the global service mutex for the dispatch,
//! logs the call, configures reconnect policy on collaborators, tries each
//! family handler in the mandated order, and returns a protocol error if
//! none claim the verb.

mod args;
mod catalog;
mod cron;
mod file;
mod game;
mod player;
mod reconnect;
mod schedule;
mod system;
mod turn;

pub use reconnect::{Reconnectable, ReconnectPolicy};

use args::Args;
use bytes::Bytes;
use host_arbiter::Arbiter;
use host_auth::Session;
use host_core::{Clock, HostError, HostResult};
use host_domain::{FileService, GameDomain, PlayerDomain, ScheduleDomain, ToolCatalog, TurnDomain};
use host_scheduler::Scheduler;
use host_store::GameStoreView;
use host_wire::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything a connection's dispatch loop needs, bundled once at startup and
/// shared (via `Arc`) across every connection worker (§5 "one worker per
/// connection").
pub struct Dispatcher {
    store: Arc<GameStoreView>,
    games: Arc<GameDomain>,
    players: Arc<PlayerDomain>,
    turns: Arc<TurnDomain>,
    schedules: Arc<ScheduleDomain>,
    catalog: Arc<ToolCatalog>,
    arbiter: Arc<Arbiter>,
    scheduler: Arc<Scheduler>,
    files: Arc<dyn FileService>,
    clock: Arc<dyn Clock>,
    reconnectable: Vec<Arc<dyn Reconnectable>>,
    /// The global service mutex (§5): held for the full duration of a
    /// dispatch so commands across connections are strictly serialized. This
    /// is the exact same `Arc` the scheduler worker locks around its own
    /// shared-state mutations, passed in by the caller (see `main.rs`) —
    /// not a second, merely-similar mutex.
    service_lock: Arc<Mutex<()>>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<GameStoreView>,
        games: Arc<GameDomain>,
        players: Arc<PlayerDomain>,
        turns: Arc<TurnDomain>,
        schedules: Arc<ScheduleDomain>,
        catalog: Arc<ToolCatalog>,
        arbiter: Arc<Arbiter>,
        scheduler: Arc<Scheduler>,
        files: Arc<dyn FileService>,
        clock: Arc<dyn Clock>,
        reconnectable: Vec<Arc<dyn Reconnectable>>,
        service_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            store,
            games,
            players,
            turns,
            schedules,
            catalog,
            arbiter,
            scheduler,
            files,
            clock,
            reconnectable,
            service_lock,
        }
    }

    /// Runs one request through every family handler in the order §4.8
    /// mandates, returning a protocol error if none of them recognize the
    /// verb.
    pub async fn dispatch(&self, session: &mut Session, request: &[Bytes]) -> HostResult<Value> {
        let verb_bytes = request
            .first()
            .ok_or_else(|| HostError::BadRequest("empty request".into()))?;
        let verb = String::from_utf8(verb_bytes.to_vec())
            .map_err(|_| HostError::BadRequest("verb is not valid utf-8".into()))?
            .to_ascii_uppercase();

        let _permit = self.service_lock.lock().await;
        log::info!("[dispatch] {verb} {:?}", &request[1..]);
        self.configure_reconnect();

        let mut args = Args::new(&request[1..]);
        let now = self.clock.now();

        if let Some(result) = system::try_dispatch(&verb, &mut args, session) {
            return result;
        }
        if let Some(result) = catalog::try_dispatch(&verb, &mut args, &self.catalog).await {
            return result;
        }
        if let Some(result) = game::try_dispatch(&verb, &mut args, session, &self.games, &self.catalog, &self.arbiter).await {
            return result;
        }
        if let Some(result) = turn::try_dispatch(&verb, &mut args, session, &self.turns).await {
            return result;
        }
        if let Some(result) = player::try_dispatch(&verb, &mut args, session, &self.players, &self.store).await {
            return result;
        }
        if let Some(result) = schedule::try_dispatch(&verb, &mut args, &self.schedules, now).await {
            return result;
        }
        if let Some(result) = file::try_dispatch(&verb, &mut args, &self.files).await {
            return result;
        }
        if let Some(result) = cron::try_dispatch(&verb, &mut args, session, &self.scheduler).await {
            return result;
        }

        Err(HostError::BadRequest(format!("unrecognized verb {verb:?}")))
    }

    fn configure_reconnect(&self) {
        for collaborator in &self.reconnectable {
            collaborator.configure_reconnect(ReconnectPolicy::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_core::ScaledClock;
    use host_domain::{MemoryFileService, NullForum, NullScheduleNotifier, NullSessionRouter};
    use host_store::MemoryStore;
    use host_subprocess::ProcessRunner;

    fn harness() -> Dispatcher {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let games = Arc::new(GameDomain::new(
            store.clone(),
            Arc::new(NullForum),
            Arc::new(NullSessionRouter),
            Arc::new(NullScheduleNotifier),
        ));
        let files: Arc<dyn FileService> = Arc::new(MemoryFileService::new());
        let players = Arc::new(PlayerDomain::new(store.clone(), files.clone(), Arc::new(NullScheduleNotifier)));
        let turns = Arc::new(TurnDomain::new(
            store.clone(),
            files.clone(),
            Arc::new(ProcessRunner::new()),
            "true",
            Arc::new(NullScheduleNotifier),
        ));
        let schedules = Arc::new(ScheduleDomain::new(store.clone(), Arc::new(host_core::Random::seeded(1))));
        let catalog = Arc::new(ToolCatalog::new(store.clone(), files.clone()));
        let arbiter = Arc::new(Arbiter::new());
        let clock: Arc<dyn Clock> = Arc::new(ScaledClock::default());
        let service_lock = Arc::new(Mutex::new(()));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            arbiter.clone(),
            Arc::new(ProcessRunner::new()),
            clock.clone(),
            games.clone(),
            catalog.clone(),
            service_lock.clone(),
        ));

        Dispatcher::new(
            store, games, players, turns, schedules, catalog, arbiter, scheduler, files, clock, Vec::new(), service_lock,
        )
    }

    fn req(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[tokio::test]
    async fn ping_pongs() {
        let dispatcher = harness();
        let mut session = Session::admin();
        let reply = dispatcher.dispatch(&mut session, &req(&["PING"])).await.unwrap();
        assert_eq!(reply, Value::String("PONG".to_string()));
    }

    #[tokio::test]
    async fn unknown_verb_is_a_protocol_error() {
        let dispatcher = harness();
        let mut session = Session::admin();
        let err = dispatcher.dispatch(&mut session, &req(&["NOSUCHVERB"])).await.unwrap_err();
        assert!(matches!(err, HostError::BadRequest(_)));
    }

    #[tokio::test]
    async fn newgame_then_gamestat_round_trip_through_full_dispatcher() {
        let dispatcher = harness();
        let mut session = Session::admin();
        let reply = dispatcher.dispatch(&mut session, &req(&["NEWGAME"])).await.unwrap();
        let id = match reply {
            Value::Integer(n) => n,
            other => panic!("expected integer id, got {other:?}"),
        };
        let reply = dispatcher
            .dispatch(&mut session, &req(&["GAMESTAT", &id.to_string()]))
            .await
            .unwrap();
        assert!(matches!(reply, Value::Map(_)));
    }

    #[tokio::test]
    async fn user_verb_switches_session_identity() {
        let dispatcher = harness();
        let mut session = Session::admin();
        dispatcher.dispatch(&mut session, &req(&["USER", "ua"])).await.unwrap();
        assert_eq!(session.user(), "ua");
        dispatcher.dispatch(&mut session, &req(&["USER", ""])).await.unwrap();
        assert!(session.is_admin());
    }
}
