//! Schedule domain operations (§4.7): push/replace/modify/list/drop a
//! game's schedule stack, plus daytime auto-assignment and the preview
//! simulation built on the pure schedule engine.

use host_core::{HostResult, Random, MINUTES_PER_DAY};
use host_store::{EndCondition, GameStoreView, ScheduleItem, ScheduleType};
use std::sync::Arc;

pub struct ScheduleDomain {
    store: Arc<GameStoreView>,
    random: Arc<Random>,
}

/// A partial schedule spec as accepted by `add`/`replace`/`modify` (§4.7):
/// only populated fields override the defaulting rules described there.
#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    pub kind: Option<ScheduleType>,
    pub interval_or_weekdays: Option<i64>,
    pub daytime: Option<i64>,
    pub delay: Option<i64>,
    pub host_early: Option<bool>,
    pub end_condition: Option<EndCondition>,
    pub end_parameter: Option<i64>,
}

impl ScheduleDomain {
    pub fn new(store: Arc<GameStoreView>, random: Arc<Random>) -> Self {
        Self { store, random }
    }

    /// (§4.7 `add`). Pushes `patch` onto the stack; omitted fields default
    /// to the current top item's value, or service defaults if the stack is
    /// empty.
    pub async fn add(&self, game: i64, patch: &SchedulePatch) -> HostResult<()> {
        let base = self.store.get_schedule_stack(game).await?.into_iter().next();
        let item = self.materialize(game, patch, base.as_ref()).await?;
        self.store.push_schedule(game, &item).await
    }

    /// (§4.7 `replace`). Discards the stack, pushing a single new item with
    /// the same defaulting rules as `add`.
    pub async fn replace(&self, game: i64, patch: &SchedulePatch) -> HostResult<()> {
        let base = self.store.get_schedule_stack(game).await?.into_iter().next();
        let item = self.materialize(game, patch, base.as_ref()).await?;
        self.store.replace_schedule(game, &item).await
    }

    /// (§4.7 `modify`). Overlays `patch`'s populated fields onto the top item.
    pub async fn modify(&self, game: i64, patch: &SchedulePatch) -> HostResult<()> {
        let top = self.store.get_schedule_stack(game).await?.into_iter().next();
        let item = self.materialize(game, patch, top.as_ref()).await?;
        self.store.replace_top_schedule(game, &item).await
    }

    /// (§4.7 `drop`). Idempotent on an empty stack.
    pub async fn drop_top(&self, game: i64) -> HostResult<()> {
        self.store.pop_schedule(game).await.map(|_| ())
    }

    /// (§4.7 `getAll`). Top-first, matching stack order.
    pub async fn get_all(&self, game: i64) -> HostResult<Vec<ScheduleItem>> {
        self.store.get_schedule_stack(game).await
    }

    /// (§4.7 `preview`). An unlimited preview (no turn limit) is refused.
    pub async fn preview(
        &self,
        game: i64,
        turn: i64,
        now: i64,
        mastered: bool,
        time_limit: Option<i64>,
        turn_limit: Option<u32>,
    ) -> HostResult<Vec<i64>> {
        let Some(item) = self.store.get_schedule_stack(game).await?.into_iter().next() else {
            return Ok(Vec::new());
        };
        Ok(host_schedule::preview(&item, turn, now, mastered, time_limit, turn_limit))
    }

    async fn materialize(
        &self,
        game: i64,
        patch: &SchedulePatch,
        base: Option<&ScheduleItem>,
    ) -> HostResult<ScheduleItem> {
        let defaults = base.cloned().unwrap_or_default();
        let daytime = match patch.daytime {
            Some(d) => d,
            None => match base.map(|b| b.daytime) {
                Some(existing) => existing,
                None => self.auto_daytime(game).await?,
            },
        };
        Ok(ScheduleItem {
            kind: patch.kind.unwrap_or(defaults.kind),
            interval_or_weekdays: patch.interval_or_weekdays.unwrap_or(defaults.interval_or_weekdays),
            daytime,
            delay: patch.delay.unwrap_or(defaults.delay),
            host_early: patch.host_early.unwrap_or(defaults.host_early),
            end_condition: patch.end_condition.unwrap_or(defaults.end_condition),
            end_parameter: patch.end_parameter.unwrap_or(defaults.end_parameter),
        })
    }

    /// (§4.7 "Daytime auto-assignment"): picks the minute-of-day that
    /// collides with the fewest other games' current daytimes, breaking
    /// ties with the random source.
    async fn auto_daytime(&self, _game: i64) -> HostResult<i64> {
        let existing = self.store.current_daytimes().await?;
        let mut counts = vec![0u32; MINUTES_PER_DAY as usize];
        for d in existing {
            let idx = d.rem_euclid(MINUTES_PER_DAY) as usize;
            counts[idx] += 1;
        }
        let min = counts.iter().copied().min().unwrap_or(0);
        let candidates: Vec<i64> = counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == min)
            .map(|(i, _)| i as i64)
            .collect();
        Ok(*self.random.choose(&candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_store::MemoryStore;

    fn domain() -> ScheduleDomain {
        ScheduleDomain::new(
            Arc::new(GameStoreView::new(Arc::new(MemoryStore::new()))),
            Arc::new(Random::seeded(1)),
        )
    }

    #[tokio::test]
    async fn replace_leaves_a_single_item() {
        let d = domain();
        d.add(1, &SchedulePatch::default()).await.unwrap();
        d.add(1, &SchedulePatch::default()).await.unwrap();
        assert_eq!(d.get_all(1).await.unwrap().len(), 2);

        d.replace(
            1,
            &SchedulePatch {
                kind: Some(ScheduleType::Daily),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let stack = d.get_all(1).await.unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].kind, ScheduleType::Daily);
    }

    #[tokio::test]
    async fn modify_overlays_only_populated_fields() {
        let d = domain();
        d.add(
            1,
            &SchedulePatch {
                kind: Some(ScheduleType::Daily),
                interval_or_weekdays: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        d.modify(
            1,
            &SchedulePatch {
                interval_or_weekdays: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let top = d.get_all(1).await.unwrap().into_iter().next().unwrap();
        assert_eq!(top.kind, ScheduleType::Daily);
        assert_eq!(top.interval_or_weekdays, 7);
    }

    #[tokio::test]
    async fn drop_is_idempotent_on_empty_stack() {
        let d = domain();
        d.drop_top(1).await.unwrap();
        d.drop_top(1).await.unwrap();
        assert!(d.get_all(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_preview_matches_scenario_four() {
        let d = domain();
        d.add(
            1,
            &SchedulePatch {
                kind: Some(ScheduleType::Daily),
                interval_or_weekdays: Some(3),
                end_condition: Some(EndCondition::Turn),
                end_parameter: Some(10),
                host_early: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let times = d.preview(1, 0, 0, false, None, Some(100)).await.unwrap();
        assert_eq!(times.len(), 11);
        for pair in times[1..].windows(2) {
            assert_eq!(pair[1] - pair[0], 3 * MINUTES_PER_DAY);
        }
    }

    #[tokio::test]
    async fn unlimited_preview_is_refused() {
        let d = domain();
        d.add(1, &SchedulePatch::default()).await.unwrap();
        assert!(d.preview(1, 0, 0, false, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_daytime_avoids_existing_collisions() {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        // Seed two other games that both currently sit at daytime 0.
        for id in [1i64, 2] {
            let game = host_store::Game {
                id,
                state: host_store::GameState::Running,
                ..Default::default()
            };
            store.put_game(&game).await.unwrap();
            store
                .push_schedule(
                    id,
                    &ScheduleItem {
                        daytime: 0,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let d = ScheduleDomain::new(store, Arc::new(Random::seeded(1)));
        d.add(3, &SchedulePatch::default()).await.unwrap();
        let top = d.get_all(3).await.unwrap().into_iter().next().unwrap();
        assert_ne!(top.daytime, 0);
    }
}
