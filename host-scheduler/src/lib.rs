//! The scheduler worker (§4.3): a single background loop owning three
//! per-game queues — `future` (sorted by due time), `due` (running or
//! queued-to-run, each holding the arbiter in `host` mode), and `changed`
//! (ids needing their event recomputed). `Scheduler` also implements
//! [`host_domain::ScheduleNotifier`], which is how the rest of the service
//! reports `handleGameChange` without this crate depending back on the
//! dispatcher.

use async_trait::async_trait;
use host_arbiter::{Arbiter, Handle, Mode};
use host_core::{Clock, HostError, HostResult, MAX_SLOTS};
use host_domain::{GameDomain, ScheduleNotifier, ToolCatalog};
use host_schedule::{next_event, Context, Outcome, SlotReadiness};
use host_store::{GameStoreView, ScheduleItem, ToolKind};
use host_subprocess::{Command, ProcessRunner};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Duration;

/// A consecutive-failure count at or above this marks a game "broken" (§7
/// "Persistent failure"): excluded from scheduling until `CRONKICK`.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
/// Retry delay (scaled minutes) after a non-broken engine-run failure.
pub const RETRY_DELAY_MINUTES: i64 = 5;
/// How often the idle loop wakes to re-check `future` against the clock.
/// The `Clock` abstraction (§6) only exposes scaled-minutes "now", not the
/// timescale needed to convert a due-time delta into a real sleep duration,
/// so this is a fixed poll interval rather than a precise one-shot sleep;
/// `handleGameChange` and shutdown both wake the loop immediately regardless.
const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Master,
    Host,
}

/// A scheduler-output event (§3 "Schedule event"): `(gameId, action, due)`.
#[derive(Debug, Clone, Copy)]
pub struct GameEvent {
    pub game: i64,
    pub action: EventAction,
    pub due: i64,
}

struct DueEntry {
    game: i64,
    action: EventAction,
    due: i64,
    /// Held for the entry's entire visit to `due` (§4.1 "held for the
    /// duration of the visit"); dropping it releases the arbiter.
    handle: Handle,
}

#[derive(Default)]
struct SchedulerState {
    future: Vec<GameEvent>,
    due: VecDeque<DueEntry>,
    changed: VecDeque<i64>,
    failures: HashMap<i64, u32>,
    broken: HashSet<i64>,
}

pub struct Scheduler {
    store: Arc<GameStoreView>,
    arbiter: Arc<Arbiter>,
    runner: Arc<ProcessRunner>,
    clock: Arc<dyn Clock>,
    games: Arc<GameDomain>,
    catalog: Arc<ToolCatalog>,
    state: Mutex<SchedulerState>,
    /// The same global service mutex the dispatcher holds for the duration
    /// of a command (§5). The background loop below acquires it around every
    /// mutation to shared state, releasing it specifically around
    /// [`Self::invoke_engine`]'s subprocess call. Methods reachable from a
    /// dispatch (`handle_game_change`, `kick`, `suspend_until`, the getters)
    /// never touch it themselves — the caller already holds it.
    global_lock: Arc<Mutex<()>>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl Scheduler {
    pub fn new(
        store: Arc<GameStoreView>,
        arbiter: Arc<Arbiter>,
        runner: Arc<ProcessRunner>,
        clock: Arc<dyn Clock>,
        games: Arc<GameDomain>,
        catalog: Arc<ToolCatalog>,
        global_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            store,
            arbiter,
            runner,
            clock,
            games,
            catalog,
            state: Mutex::new(SchedulerState::default()),
            global_lock,
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// The main loop (§4.3 steps 1-4). Runs until [`Self::request_shutdown`].
    pub async fn run(self: &Arc<Self>) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                self.runner.shutdown().await;
                log::info!("[scheduler] shut down");
                return;
            }
            if self.process_one_changed().await {
                continue;
            }
            self.migrate_due().await;
            if self.run_one_due().await {
                continue;
            }
            self.wait_for_work().await;
        }
    }

    /// Step 1: pop and recompute a single `changed` entry, if any.
    async fn process_one_changed(&self) -> bool {
        let _permit = self.global_lock.lock().await;
        let game = {
            let mut state = self.state.lock().await;
            state.changed.pop_front()
        };
        let Some(game) = game else { return false };
        self.recompute(game).await;
        true
    }

    async fn recompute(&self, game: i64) {
        {
            let mut state = self.state.lock().await;
            state.future.retain(|e| e.game != game);
        }

        if self.is_broken(game).await {
            log::debug!("[scheduler] game {game} is broken, skipping recompute");
            return;
        }

        let Some(item) = self.top_schedule(game).await else {
            return;
        };
        let Ok(Some(g)) = self.store.get_game(game).await else {
            return;
        };
        let slots = self.store.get_slots(game, MAX_SLOTS).await.unwrap_or_default();
        let ctx = Context {
            turn: g.turn,
            now: self.clock.now(),
            mastered: g.turn > 0,
            last_run: g.last_run,
            slots: slots
                .iter()
                .map(|s| SlotReadiness {
                    occupied: s.is_occupied(),
                    ready: s.is_occupied() && s.state.is_ready(),
                    temporary: s.state.is_temporary(),
                })
                .collect(),
        };

        match next_event(&item, &ctx) {
            Outcome::NoEvent => {}
            Outcome::Terminal => {
                log::info!("[scheduler] game {game} reached its end condition");
                let scores = BTreeMap::new();
                if let Err(e) = self.games.evaluate_victory(game, item.end_parameter, &scores).await {
                    log::warn!("[scheduler] victory evaluation failed for game {game}: {e}");
                }
            }
            Outcome::Master(due) => {
                self.insert_future(GameEvent { game, action: EventAction::Master, due }).await;
            }
            Outcome::Host(due) => {
                self.insert_future(GameEvent { game, action: EventAction::Host, due }).await;
            }
        }
    }

    async fn top_schedule(&self, game: i64) -> Option<ScheduleItem> {
        self.store.get_schedule_stack(game).await.ok()?.into_iter().next()
    }

    async fn insert_future(&self, event: GameEvent) {
        let mut state = self.state.lock().await;
        let pos = state.future.partition_point(|e| e.due <= event.due);
        state.future.insert(pos, event);
        drop(state);
        self.notify.notify_one();
    }

    /// Step 2: move every due `future` entry into `due`, acquiring the
    /// arbiter in host mode for each as it moves.
    ///
    /// The arbiter wait below is deliberately outside the global lock: it can
    /// block for as long as a command holds the game in simple mode, and
    /// holding the global lock across that wait would stall every other
    /// connection's dispatch for no reason (§5's "respond promptly"
    /// assumption does not apply to arbiter waits).
    async fn migrate_due(&self) {
        let now = self.clock.now();
        let ready: Vec<GameEvent> = {
            let _permit = self.global_lock.lock().await;
            let mut state = self.state.lock().await;
            let split = state.future.partition_point(|e| e.due <= now);
            state.future.drain(..split).collect()
        };
        for event in ready {
            let handle = self.arbiter.acquire(event.game, Mode::Host).await;
            let _permit = self.global_lock.lock().await;
            let mut state = self.state.lock().await;
            state.due.push_back(DueEntry {
                game: event.game,
                action: event.action,
                due: event.due,
                handle,
            });
        }
    }

    /// Step 3: run the head of `due`, if any.
    async fn run_one_due(&self) -> bool {
        let entry = {
            let _permit = self.global_lock.lock().await;
            let mut state = self.state.lock().await;
            state.due.pop_front()
        };
        let Some(entry) = entry else { return false };
        self.run_due(entry).await;
        true
    }

    async fn run_due(&self, entry: DueEntry) {
        let DueEntry { game, action, handle, .. } = entry;
        let outcome = self.invoke_engine(game, action).await;
        drop(handle);

        // Re-acquire the global lock before re-importing results (§5).
        let _permit = self.global_lock.lock().await;
        match outcome {
            Ok(()) => self.clear_failures(game).await,
            Err(e) => {
                log::warn!("[scheduler] game {game} {action:?} run failed: {e}");
                if self.record_failure(game).await {
                    log::error!("[scheduler] game {game} marked broken after repeated failures");
                    return;
                }
                self.insert_future(GameEvent {
                    game,
                    action,
                    due: self.clock.now() + RETRY_DELAY_MINUTES,
                })
                .await;
                return;
            }
        }
        self.recompute(game).await;
    }

    /// Builds and runs the engine command, holding the global lock for
    /// everything except the subprocess call itself (§5's "notable
    /// exception"): the helper's own internal mutex already serializes
    /// concurrent engine runs, so there is nothing gained by blocking every
    /// other connection's dispatch for however long the engine takes.
    async fn invoke_engine(&self, game: i64, action: EventAction) -> HostResult<()> {
        let permit = self.global_lock.lock().await;
        let g = self.games.get(game).await?;
        let kind = match action {
            EventAction::Master => ToolKind::Master,
            EventAction::Host => ToolKind::Host,
        };
        let tool_id = g
            .tools
            .get(&kind)
            .ok_or_else(|| HostError::WrongState(format!("game {game} has no {kind:?} tool configured")))?;
        let tool = self.catalog.get(kind, tool_id).await?;
        let program = tool.executable.clone().unwrap_or_else(|| tool.id.clone());
        let mut cmd = Command::new(program).work_directory(g.directory.clone());
        if let Some(path) = &tool.path {
            cmd = cmd.arg(path.clone());
        }
        drop(permit);
        let output = self.runner.run(&cmd).await?;
        let _permit = self.global_lock.lock().await;

        if output.exit_code != 0 {
            return Err(HostError::BadRequest(format!("{kind:?} tool exited {}", output.exit_code)));
        }

        let mut updated = g;
        let now = self.clock.now();
        if action == EventAction::Master {
            updated.turn = updated.turn.max(1);
        } else {
            updated.turn += 1;
        }
        updated.last_run = Some(now);
        updated.timestamp = format!("t{now}");
        self.store.put_game(&updated).await
    }

    /// Returns `true` once `game` crosses into "broken".
    async fn record_failure(&self, game: i64) -> bool {
        let mut state = self.state.lock().await;
        let count = state.failures.entry(game).or_insert(0);
        *count += 1;
        if *count >= MAX_CONSECUTIVE_FAILURES {
            state.broken.insert(game);
            true
        } else {
            false
        }
    }

    async fn clear_failures(&self, game: i64) {
        self.state.lock().await.failures.remove(&game);
    }

    async fn is_broken(&self, game: i64) -> bool {
        self.state.lock().await.broken.contains(&game)
    }

    /// Step 4: sleep until woken, either by the next poll tick or by
    /// `handleGameChange`/shutdown (see [`IDLE_POLL`]'s doc comment).
    async fn wait_for_work(&self) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }
    }

    // --- externally-visible operations (§4.3) ---

    pub async fn get_game_event(&self, game: i64) -> Option<GameEvent> {
        let state = self.state.lock().await;
        if let Some(entry) = state.due.iter().find(|e| e.game == game) {
            return Some(GameEvent { game, action: entry.action, due: entry.due });
        }
        state.future.iter().find(|e| e.game == game).copied()
    }

    pub async fn list_game_events(&self) -> Vec<GameEvent> {
        let state = self.state.lock().await;
        let mut out: Vec<GameEvent> = state.future.clone();
        out.extend(
            state
                .due
                .iter()
                .map(|e| GameEvent { game: e.game, action: e.action, due: e.due }),
        );
        out
    }

    /// (§4.3 `suspendScheduler`). Advances every future event to at least
    /// `at`, used for operator-initiated grace periods after outages.
    pub async fn suspend_until(&self, at: i64) {
        let mut state = self.state.lock().await;
        for event in state.future.iter_mut() {
            event.due = event.due.max(at);
        }
        state.future.sort_by_key(|e| e.due);
    }

    /// (§7 "Persistent failure"). The admin-facing `CRONKICK` verb: clears
    /// the broken flag and forces recomputation.
    pub async fn kick(&self, game: i64) {
        {
            let mut state = self.state.lock().await;
            state.broken.remove(&game);
            state.failures.remove(&game);
        }
        self.handle_game_change(game).await;
    }
}

#[async_trait]
impl ScheduleNotifier for Scheduler {
    /// (§4.3 `handleGameChange`). Appends to `changed` and wakes the loop.
    async fn handle_game_change(&self, game: i64) {
        {
            let mut state = self.state.lock().await;
            state.changed.push_back(game);
        }
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_core::FixedClock;
    use host_domain::{MemoryFileService, NullForum, NullScheduleNotifier, NullSessionRouter};
    use host_store::{Game, GameState, MemoryStore, ScheduleType, Slot, Tool};

    async fn harness(clock: Arc<FixedClock>) -> (Arc<Scheduler>, Arc<GameStoreView>, Arc<GameDomain>, Arc<ToolCatalog>) {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let games = Arc::new(GameDomain::new(
            store.clone(),
            Arc::new(NullForum),
            Arc::new(NullSessionRouter),
            Arc::new(NullScheduleNotifier),
        ));
        let files = Arc::new(MemoryFileService::new());
        let catalog = Arc::new(ToolCatalog::new(store.clone(), files));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            Arc::new(Arbiter::new()),
            Arc::new(ProcessRunner::new()),
            clock,
            games.clone(),
            catalog.clone(),
            Arc::new(Mutex::new(())),
        ));
        (scheduler, store, games, catalog)
    }

    async fn seed_running_game(store: &GameStoreView, catalog: &ToolCatalog, id: i64, program: &str) {
        catalog
            .add(
                ToolKind::Host,
                Tool {
                    id: "hosttool".to_string(),
                    kind: ToolKind::Host,
                    executable: Some(program.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut game = Game {
            id,
            state: GameState::Running,
            directory: format!("games/{id:04}"),
            turn: 1,
            ..Default::default()
        };
        game.tools.insert(ToolKind::Host, "hosttool".to_string());
        store.put_game(&game).await.unwrap();
        store.put_slot(id, &Slot { number: 1, chain: vec!["ua".to_string()], ..Default::default() }).await.unwrap();
        store
            .push_schedule(
                id,
                &host_store::ScheduleItem {
                    kind: ScheduleType::Asap,
                    delay: 0,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn handle_game_change_enqueues_and_recompute_schedules_an_event() {
        let clock = Arc::new(FixedClock::new(1000));
        let (scheduler, store, _games, catalog) = harness(clock).await;
        seed_running_game(&store, &catalog, 1, "true").await;

        scheduler.handle_game_change(1).await;
        scheduler.process_one_changed().await;

        let event = scheduler.get_game_event(1).await.expect("event scheduled");
        assert_eq!(event.game, 1);
        assert_eq!(event.action, EventAction::Host);
    }

    #[tokio::test]
    async fn due_run_advances_turn_and_releases_arbiter() {
        let clock = Arc::new(FixedClock::new(1000));
        let (scheduler, store, _games, catalog) = harness(clock.clone()).await;
        seed_running_game(&store, &catalog, 1, "true").await;

        scheduler.handle_game_change(1).await;
        assert!(scheduler.process_one_changed().await);
        scheduler.migrate_due().await;
        assert!(scheduler.run_one_due().await);

        let game = store.get_game(1).await.unwrap().unwrap();
        assert_eq!(game.turn, 2);
        assert!(!scheduler.arbiter.is_host_held(1).await);
    }

    #[tokio::test]
    async fn repeated_failure_marks_game_broken() {
        let clock = Arc::new(FixedClock::new(1000));
        let (scheduler, store, _games, catalog) = harness(clock).await;
        seed_running_game(&store, &catalog, 1, "false").await;

        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            scheduler.handle_game_change(1).await;
            scheduler.process_one_changed().await;
            scheduler.migrate_due().await;
            scheduler.run_one_due().await;
        }
        assert!(scheduler.is_broken(1).await);

        scheduler.kick(1).await;
        assert!(!scheduler.is_broken(1).await);
    }

    #[tokio::test]
    async fn suspend_until_advances_every_future_event() {
        let clock = Arc::new(FixedClock::new(1000));
        let (scheduler, _store, _games, _catalog) = harness(clock).await;
        scheduler.insert_future(GameEvent { game: 1, action: EventAction::Host, due: 500 }).await;
        scheduler.insert_future(GameEvent { game: 2, action: EventAction::Host, due: 2000 }).await;

        scheduler.suspend_until(1500).await;
        let events = scheduler.list_game_events().await;
        assert!(events.iter().all(|e| e.due >= 1500));
    }
}
