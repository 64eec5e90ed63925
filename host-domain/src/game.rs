//! Game domain operations (§4.4): create, clone, list, config, permissions,
//! tool attach/detach, victory evaluation.

use crate::collaborators::{Forum, ScheduleNotifier, SessionRouter};
use host_auth::{compute_bits, Permission, Session};
use host_core::{HostError, HostResult, RANK_POINTS_BASE};
use host_store::{Game, GameState, GameStoreView, GameType, Slot, Tool, ToolKind};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct GameDomain {
    store: Arc<GameStoreView>,
    forum: Arc<dyn Forum>,
    router: Arc<dyn SessionRouter>,
    notifier: Arc<dyn ScheduleNotifier>,
}

/// Filters accepted by `GAMELIST` (§4.4 "List games").
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub state: Option<GameState>,
    pub game_type: Option<GameType>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub master: Option<String>,
    pub shiplist: Option<String>,
    pub tool: Option<String>,
}

const KEY_HOST: &str = "host";
const KEY_MASTER: &str = "master";
const KEY_SHIPLIST: &str = "shiplist";
const TOOL_CONFIG_KEYS: &[&str] = &[KEY_HOST, KEY_MASTER, KEY_SHIPLIST, "extratools"];
const END_CONFIG_KEYS: &[&str] = &["endcondition", "endturn", "endscore", "endprobability"];

impl GameDomain {
    pub fn new(
        store: Arc<GameStoreView>,
        forum: Arc<dyn Forum>,
        router: Arc<dyn SessionRouter>,
        notifier: Arc<dyn ScheduleNotifier>,
    ) -> Self {
        Self {
            store,
            forum,
            router,
            notifier,
        }
    }

    /// Allocates a fresh id and writes the starting metadata (§4.4 "Create game").
    pub async fn create(&self) -> HostResult<i64> {
        let id = self.store.allocate_game_id().await?;
        let mut tools = BTreeMap::new();
        for kind in [ToolKind::Host, ToolKind::Master, ToolKind::Shiplist] {
            if let Some(default) = self.store.get_default_tool(kind).await? {
                tools.insert(kind, default);
            }
        }
        let game = Game {
            id,
            name: "New Game".to_string(),
            game_type: GameType::Private,
            state: GameState::Preparing,
            directory: format!("games/{id:04}"),
            tools,
            ..Default::default()
        };
        self.store.put_game(&game).await?;
        log::info!("[domain] created game {id}");
        Ok(id)
    }

    /// Admin-only. The clone target must not be currently held in `host`
    /// mode — enforced by the caller passing in whether the arbiter reports
    /// it held, since `host-domain` does not itself depend on `host-arbiter`.
    pub async fn clone_game(&self, source: i64, source_held_in_host_mode: bool) -> HostResult<i64> {
        if source_held_in_host_mode {
            return Err(HostError::Conflict(format!(
                "game {source} is currently being hosted"
            )));
        }
        let original = self
            .store
            .get_game(source)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {source}")))?;

        let id = self.store.allocate_game_id().await?;
        let mut clone = original.clone();
        clone.id = id;
        clone.directory = format!("games/{id:04}");
        clone.state = GameState::Joining;
        clone.turn = 0;
        clone.timestamp = String::new();
        clone.copy_of = Some(source);
        clone.name = next_copy_name(&original.name);
        self.store.put_game(&clone).await?;

        for item in self.store.get_schedule_stack(source).await?.into_iter().rev() {
            self.store.push_schedule(id, &item).await?;
        }
        log::info!("[domain] cloned game {source} as {id}");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> HostResult<Game> {
        self.store
            .get_game(id)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {id}")))
    }

    pub async fn set_state(&self, id: i64, state: GameState) -> HostResult<()> {
        let mut game = self.get(id).await?;
        let previous = game.state;
        game.state = state;
        self.store.put_game(&game).await?;
        if previous != state {
            self.forum
                .open_group(id, &game.name)
                .await
                .unwrap_or_else(|e| log::warn!("[domain] forum notify failed for game {id}: {e}"));
            self.router.close_game_sessions(id).await.unwrap_or_else(|e| {
                log::warn!("[domain] session router notify failed for game {id}: {e}")
            });
            self.notifier.handle_game_change(id).await;
            if state == GameState::Deleted {
                self.forum.close_group(id).await.unwrap_or_else(|e| {
                    log::warn!("[domain] forum close failed for game {id}: {e}")
                });
            }
        }
        Ok(())
    }

    pub async fn set_type(&self, id: i64, game_type: GameType) -> HostResult<()> {
        let mut game = self.get(id).await?;
        game.game_type = game_type;
        self.store.put_game(&game).await
    }

    pub async fn set_name(&self, id: i64, name: String) -> HostResult<()> {
        let mut game = self.get(id).await?;
        game.name = name;
        self.store.put_game(&game).await
    }

    /// List all games matching `filter`, restricted by `session` read access
    /// (§4.4 "List games (filter-based)").
    pub async fn list(&self, session: &Session, filter: &GameFilter) -> HostResult<Vec<i64>> {
        let mut out = Vec::new();
        for id in self.store.list_game_ids().await? {
            let Some(game) = self.store.get_game(id).await? else {
                continue;
            };
            if !matches_filter(&game, filter) {
                continue;
            }
            if !self.tool_matches(&game, filter).await? {
                continue;
            }
            if let Some(user) = &filter.user {
                let max_slot = host_core::MAX_SLOTS;
                let slots = self.store.get_slots(id, max_slot).await?;
                if !slots.iter().any(|s| s.chain.iter().any(|u| u == user)) && &game.owner != user {
                    continue;
                }
            }
            if !session.is_admin() {
                let slots = self.store.get_slots(id, host_core::MAX_SLOTS).await?;
                let joinable = matches!(game.state, GameState::Preparing | GameState::Joining);
                let bits = compute_bits(&game, &slots, session.user(), joinable);
                if session.check_permission(&bits, Permission::Read).is_err() {
                    continue;
                }
            }
            out.push(id);
        }
        Ok(out)
    }

    async fn tool_matches(&self, game: &Game, filter: &GameFilter) -> HostResult<bool> {
        if let Some(want) = &filter.host {
            if game.tools.get(&ToolKind::Host) != Some(want) {
                return Ok(false);
            }
        }
        if let Some(want) = &filter.master {
            if game.tools.get(&ToolKind::Master) != Some(want) {
                return Ok(false);
            }
        }
        if let Some(want) = &filter.shiplist {
            if game.tools.get(&ToolKind::Shiplist) != Some(want) {
                return Ok(false);
            }
        }
        if let Some(want) = &filter.tool {
            if !game.extra_tools.iter().any(|t| t == want) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Reads a single config value (empty string if unset).
    pub async fn get_config(&self, id: i64, key: &str) -> HostResult<String> {
        let game = self.get(id).await?;
        Ok(game.config.get(key).cloned().unwrap_or_default())
    }

    /// Applies a batch of config assignments atomically (§4.4 "Get/set config"):
    /// if any assignment fails validation, none take effect.
    pub async fn set_config(
        &self,
        id: i64,
        assignments: &[(String, String)],
        known_tool: impl Fn(ToolKind, &str) -> bool,
    ) -> HostResult<()> {
        let mut game = self.get(id).await?;
        let mut touches_tools = false;
        let mut touches_end = false;
        let mut end_changed_explicit = false;

        for (key, value) in assignments {
            let lower = key.to_ascii_lowercase();
            if TOOL_CONFIG_KEYS.contains(&lower.as_str()) {
                touches_tools = true;
                if lower == KEY_HOST && !known_tool(ToolKind::Host, value) {
                    return Err(HostError::BadRequest(format!("unknown host tool {value}")));
                }
                if lower == KEY_MASTER && !known_tool(ToolKind::Master, value) {
                    return Err(HostError::BadRequest(format!("unknown master tool {value}")));
                }
                if lower == KEY_SHIPLIST && !known_tool(ToolKind::Shiplist, value) {
                    return Err(HostError::BadRequest(format!("unknown shiplist tool {value}")));
                }
            }
            if END_CONFIG_KEYS.contains(&lower.as_str()) {
                touches_end = true;
            }
            if lower == "endchanged" {
                end_changed_explicit = true;
            }
        }

        for (key, value) in assignments {
            apply_config_key(&mut game, key, value)?;
        }
        if touches_tools {
            game.config_changed = true;
        }
        if touches_end && !end_changed_explicit {
            game.end_changed = true;
        }
        self.store.put_game(&game).await
    }

    /// Permission bits for `user` against `game` (§4.4 "Permissions").
    pub async fn permission_bits(&self, id: i64, user: &str) -> HostResult<host_auth::PermissionBits> {
        let game = self.get(id).await?;
        let slots = self.store.get_slots(id, host_core::MAX_SLOTS).await?;
        let joinable = matches!(game.state, GameState::Preparing | GameState::Joining);
        Ok(compute_bits(&game, &slots, user, joinable))
    }

    /// Attaches `tool_id` as this game's tool of `kind`, replacing any tool
    /// previously attached for that kind (§4.4 "Add/remove tool").
    pub async fn add_tool(&self, id: i64, kind: ToolKind, tool_id: &str) -> HostResult<()> {
        let mut game = self.get(id).await?;
        match kind {
            ToolKind::Host | ToolKind::Master | ToolKind::Shiplist => {
                game.tools.insert(kind, tool_id.to_string());
            }
            ToolKind::Generic => {
                if !game.extra_tools.iter().any(|t| t == tool_id) {
                    game.extra_tools.push(tool_id.to_string());
                }
            }
        }
        game.config_changed = true;
        self.store.put_game(&game).await
    }

    /// Removes a tool; returns `false` if it was not attached, errors if the
    /// tool itself does not exist (the caller supplies `tool_exists`).
    pub async fn remove_tool(
        &self,
        id: i64,
        kind: ToolKind,
        tool_id: &str,
        tool_exists: bool,
    ) -> HostResult<bool> {
        if !tool_exists {
            return Err(HostError::NotFound(format!("tool {tool_id}")));
        }
        let mut game = self.get(id).await?;
        let removed = match kind {
            ToolKind::Host | ToolKind::Master | ToolKind::Shiplist => {
                if game.tools.get(&kind).map(String::as_str) == Some(tool_id) {
                    game.tools.remove(&kind);
                    true
                } else {
                    false
                }
            }
            ToolKind::Generic => {
                let before = game.extra_tools.len();
                game.extra_tools.retain(|t| t != tool_id);
                before != game.extra_tools.len()
            }
        };
        if removed {
            game.config_changed = true;
            self.store.put_game(&game).await?;
        }
        Ok(removed)
    }

    /// Victory evaluation (§4.4): invoked after each host run. Assigns ranks
    /// by descending score when an end-condition score is configured, trusts
    /// precomputed ranks where a slot already carries one, and otherwise
    /// ties every occupied slot for first place — matching the original's
    /// `testRankingBasic` ("No ranks declared: everyone gets first place").
    ///
    /// Rank points are `RANK_POINTS_BASE` scaled by a game-wide multiplier —
    /// turns played / scheduled, difficulty, reliability (§4.4) — times a
    /// per-tie-group weight that descends from 1.0 for the best-scoring
    /// group to `1/n` for the worst across `n` distinct score groups; tied
    /// slots therefore draw the identical weight and so "share proportionally"
    /// by construction rather than by an explicit split step. A slot's own
    /// points are then divided evenly across its replacement chain — an
    /// approximation of "proportional to turns played" since per-replacement
    /// turn counts are not retained at this layer (see DESIGN.md).
    pub async fn evaluate_victory(
        &self,
        id: i64,
        scheduled_turns: i64,
        scores: &BTreeMap<u16, i64>,
    ) -> HostResult<bool> {
        let game = self.get(id).await?;
        let mut slots = self.store.get_slots(id, host_core::MAX_SLOTS).await?;
        if !slots.iter().any(Slot::is_occupied) {
            return Ok(false);
        }

        let turn_fraction = if scheduled_turns > 0 {
            ((game.turn - 1).max(0).min(scheduled_turns) as f64) / (scheduled_turns as f64)
        } else {
            1.0
        };
        let difficulty_factor = game.difficulty.map(|d| (d as f64 / 100.0).max(0.1)).unwrap_or(1.0);

        let mut reliability_sum = 0.0f64;
        let mut reliability_count = 0usize;
        for slot in slots.iter().filter(|s| s.is_occupied()) {
            if let Some(primary) = slot.primary() {
                if let Some(user) = self.store.get_user(primary).await? {
                    reliability_sum += user.effective_reliability() as f64;
                    reliability_count += 1;
                }
            }
        }
        let reliability_factor = if reliability_count > 0 {
            (reliability_sum / reliability_count as f64).max(0.1)
        } else {
            1.0
        };
        let base_pool = (RANK_POINTS_BASE as f64) * turn_fraction * difficulty_factor * reliability_factor;

        let mut ordered: Vec<(u16, i64)> = slots
            .iter()
            .filter(|s| s.is_occupied())
            .map(|s| {
                let score = scores
                    .get(&s.number)
                    .copied()
                    .unwrap_or_else(|| s.rank.map(|r| -(r as i64)).unwrap_or(0));
                (s.number, score)
            })
            .collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));

        // Group by tied score; each group's weight descends linearly from
        // 1.0 (best) to 1/num_groups (worst).
        let mut groups: Vec<Vec<u16>> = Vec::new();
        let mut i = 0usize;
        while i < ordered.len() {
            let mut j = i;
            while j + 1 < ordered.len() && ordered[j + 1].1 == ordered[i].1 {
                j += 1;
            }
            groups.push(ordered[i..=j].iter().map(|e| e.0).collect());
            i = j + 1;
        }
        let num_groups = groups.len().max(1) as f64;

        let mut rank_by_slot: BTreeMap<u16, u32> = BTreeMap::new();
        let mut points_by_slot: BTreeMap<u16, i64> = BTreeMap::new();
        let mut rank_cursor = 1u32;
        for (group_index, members) in groups.iter().enumerate() {
            let weight = (num_groups - group_index as f64) / num_groups;
            let points = (base_pool * weight).round() as i64;
            for &slot_number in members {
                rank_by_slot.insert(slot_number, rank_cursor);
                points_by_slot.insert(slot_number, points);
            }
            rank_cursor += members.len() as u32;
        }

        for slot in slots.iter_mut().filter(|s| s.is_occupied()) {
            let total_points = *points_by_slot.get(&slot.number).unwrap_or(&0);
            let per_member = total_points / slot.chain.len() as i64;
            slot.rank = rank_by_slot.get(&slot.number).copied();
            slot.rank_points = Some(per_member * slot.chain.len() as i64);
            self.store.put_slot(id, slot).await?;
        }

        self.set_state(id, GameState::Finished).await?;
        Ok(true)
    }
}

fn apply_config_key(game: &mut Game, key: &str, value: &str) -> HostResult<()> {
    match key.to_ascii_lowercase().as_str() {
        "endchanged" => game.end_changed = value == "1" || value.eq_ignore_ascii_case("true"),
        "configchanged" => game.config_changed = value == "1" || value.eq_ignore_ascii_case("true"),
        "difficulty" => {
            game.difficulty = if value.is_empty() {
                None
            } else {
                Some(value.parse().map_err(|_| HostError::BadRequest(format!("bad difficulty {value}")))?)
            };
        }
        // host/master/shiplist/extratools land here too, already validated
        // by the caller, so GETCONFIG can read them back verbatim.
        _ => {
            game.config.insert(key.to_string(), value.to_string());
        }
    }
    Ok(())
}

fn matches_filter(game: &Game, filter: &GameFilter) -> bool {
    if let Some(state) = filter.state {
        if game.state != state {
            return false;
        }
    }
    if let Some(game_type) = filter.game_type {
        if game.game_type != game_type {
            return false;
        }
    }
    true
}

/// "Old" → "Old 1", "Old 1" → "Old 2" (§4.4 "Clone game").
fn next_copy_name(name: &str) -> String {
    if let Some((base, suffix)) = name.rsplit_once(' ') {
        if let Ok(n) = suffix.parse::<u32>() {
            return format!("{base} {}", n + 1);
        }
    }
    format!("{name} 1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullForum, NullScheduleNotifier, NullSessionRouter};
    use host_store::MemoryStore;

    fn domain() -> GameDomain {
        GameDomain::new(
            Arc::new(GameStoreView::new(Arc::new(MemoryStore::new()))),
            Arc::new(NullForum),
            Arc::new(NullSessionRouter),
            Arc::new(NullScheduleNotifier),
        )
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_and_defaults() {
        let d = domain();
        let a = d.create().await.unwrap();
        let b = d.create().await.unwrap();
        assert_eq!(b, a + 1);
        let game = d.get(a).await.unwrap();
        assert_eq!(game.state, GameState::Preparing);
        assert_eq!(game.game_type, GameType::Private);
        assert_eq!(game.directory, format!("games/{a:04}"));
    }

    #[tokio::test]
    async fn clone_refuses_when_held_in_host_mode() {
        let d = domain();
        let id = d.create().await.unwrap();
        assert!(matches!(
            d.clone_game(id, true).await,
            Err(HostError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn clone_suffixes_name_and_copies_schedule() {
        let d = domain();
        let id = d.create().await.unwrap();
        d.set_name(id, "Old".into()).await.unwrap();
        let item = host_store::ScheduleItem {
            daytime: 42,
            ..Default::default()
        };
        d.store.push_schedule(id, &item).await.unwrap();

        let clone = d.clone_game(id, false).await.unwrap();
        let cloned = d.get(clone).await.unwrap();
        assert_eq!(cloned.name, "Old 1");
        assert_eq!(cloned.copy_of, Some(id));
        assert_eq!(cloned.state, GameState::Joining);
        let stack = d.store.get_schedule_stack(clone).await.unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].daytime, 42);
    }

    #[tokio::test]
    async fn clone_name_increments_again() {
        assert_eq!(next_copy_name("Old"), "Old 1");
        assert_eq!(next_copy_name("Old 1"), "Old 2");
    }

    #[tokio::test]
    async fn set_config_rolls_back_atomically_on_bad_tool() {
        let d = domain();
        let id = d.create().await.unwrap();
        let result = d
            .set_config(
                id,
                &[("difficulty".to_string(), "5".to_string()), ("host".to_string(), "nope".to_string())],
                |_, _| false,
            )
            .await;
        assert!(result.is_err());
        let game = d.get(id).await.unwrap();
        assert!(game.difficulty.is_none(), "no assignment should have applied");
    }

    #[tokio::test]
    async fn set_config_marks_config_changed_for_tool_keys() {
        let d = domain();
        let id = d.create().await.unwrap();
        d.set_config(id, &[("host".to_string(), "ok".to_string())], |_, _| true)
            .await
            .unwrap();
        let game = d.get(id).await.unwrap();
        assert!(game.config_changed);
    }

    #[tokio::test]
    async fn rank_points_for_default_60_turn_game() {
        let d = domain();
        let id = d.create().await.unwrap();
        for n in 1..=11u16 {
            let slot = Slot {
                number: n,
                chain: vec![format!("u{n}")],
                ..Default::default()
            };
            d.store.put_slot(id, &slot).await.unwrap();
        }
        let mut game = d.get(id).await.unwrap();
        game.turn = 60;
        d.store.put_game(&game).await.unwrap();

        // No scores and no precomputed ranks: every occupied slot ties for
        // first place (the literal scenario), so each should draw the same
        // 2000 * 59/60 = 1967 points.
        let scores = BTreeMap::new();
        let evaluated = d.evaluate_victory(id, 60, &scores).await.unwrap();
        assert!(evaluated);
        let slots = d.store.get_slots(id, 16).await.unwrap();
        for s in slots.iter().filter(|s| s.is_occupied()) {
            assert_eq!(s.rank_points, Some(1967), "slot {} got {:?}", s.number, s.rank_points);
        }
    }
}
