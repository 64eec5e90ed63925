//! Startup rebuild (§5 "Shared-resource policy": "the in-memory scheduler
//! lists are a cache rebuilt on startup"). The key/value store is the
//! source of truth; on boot every not-deleted game is re-announced to the
//! scheduler via `handleGameChange` so it recomputes its own `future`
//! queue from scratch, and `HOST.INITIALSUSPEND` (§6) is applied as a
//! grace period before any of those recomputed events can fire.

use host_core::Clock;
use host_domain::ScheduleNotifier;
use host_scheduler::Scheduler;
use host_store::GameStoreView;
use std::sync::Arc;

pub async fn rebuild(store: &Arc<GameStoreView>, scheduler: &Arc<Scheduler>, clock: &Arc<dyn Clock>, initial_suspend: i64) -> anyhow::Result<()> {
    let ids = store.list_game_ids().await?;
    log::info!("[startup] rebuilding scheduler state for {} game(s)", ids.len());
    for id in ids {
        scheduler.handle_game_change(id).await;
    }
    if initial_suspend > 0 {
        let until = clock.now() + initial_suspend;
        log::info!("[startup] suspending scheduler until {until} (HOST.INITIALSUSPEND={initial_suspend})");
        scheduler.suspend_until(until).await;
    }
    Ok(())
}
