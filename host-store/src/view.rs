use crate::model::{Game, GameState, Slot, Tool, ToolKind, ScheduleItem, User};
use crate::store::Store;
use host_core::HostResult;
use std::sync::Arc;

fn game_key(id: i64) -> String {
    format!("game:{id}:json")
}
fn slot_key(game: i64, slot: u16) -> String {
    format!("game:{game}:slot:{slot}:json")
}
fn schedule_key(game: i64) -> String {
    format!("game:{game}:schedule")
}
fn tool_hash(kind: ToolKind) -> String {
    format!("tools:{kind:?}")
}
fn tool_default_key(kind: ToolKind) -> String {
    format!("tools:{kind:?}:default")
}
fn user_key(id: &str) -> String {
    format!("user:{id}:json")
}
fn timestamp_index_key(timestamp: &str) -> String {
    format!("games:by-timestamp:{timestamp}")
}

/// Typed accessors over the raw `Store` (§2 "Game store view"): every other
/// component reads and writes games, slots, schedules, tools, and users
/// through here rather than touching string keys directly, the same
/// separation the source draws between `Root`'s raw key/value calls and the
/// `Game`/`HostSchedule`/`HostTool` wrapper classes built on top of it.
pub struct GameStoreView {
    store: Arc<dyn Store>,
}

impl GameStoreView {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn allocate_game_id(&self) -> HostResult<i64> {
        self.store.incr("ids:game").await
    }

    pub async fn put_game(&self, game: &Game) -> HostResult<()> {
        let blob = serde_json::to_string(game).expect("Game always serializes");
        self.store.set(&game_key(game.id), &blob).await?;
        self.store.sadd("games:all", &game.id.to_string()).await?;
        if !game.timestamp.is_empty() {
            self.store
                .set(&timestamp_index_key(&game.timestamp), &game.id.to_string())
                .await?;
        }
        for uid in game_member_ids(game) {
            self.store.sadd(&format!("user:{uid}:games"), &game.id.to_string()).await?;
        }
        Ok(())
    }

    pub async fn get_game(&self, id: i64) -> HostResult<Option<Game>> {
        match self.store.get(&game_key(id)).await? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob).unwrap_or_default())),
            None => Ok(None),
        }
    }

    pub async fn list_game_ids(&self) -> HostResult<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .store
            .smembers("games:all")
            .await?
            .into_iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub async fn find_game_by_timestamp(&self, timestamp: &str) -> HostResult<Option<i64>> {
        Ok(self
            .store
            .get(&timestamp_index_key(timestamp))
            .await?
            .and_then(|s| s.parse().ok()))
    }

    pub async fn put_slot(&self, game: i64, slot: &Slot) -> HostResult<()> {
        let blob = serde_json::to_string(slot).expect("Slot always serializes");
        self.store.set(&slot_key(game, slot.number), &blob).await
    }

    pub async fn get_slot(&self, game: i64, number: u16) -> HostResult<Slot> {
        match self.store.get(&slot_key(game, number)).await? {
            Some(blob) => Ok(serde_json::from_str(&blob).unwrap_or_default()),
            None => Ok(Slot {
                number,
                ..Slot::default()
            }),
        }
    }

    pub async fn get_slots(&self, game: i64, max_slot: u16) -> HostResult<Vec<Slot>> {
        let mut slots = Vec::with_capacity(max_slot as usize);
        for n in 1..=max_slot {
            slots.push(self.get_slot(game, n).await?);
        }
        Ok(slots)
    }

    /// Pushes a new item onto the top of the schedule stack (§3, §4.7 `add`).
    pub async fn push_schedule(&self, game: i64, item: &ScheduleItem) -> HostResult<()> {
        let mut stack = self.get_schedule_stack(game).await?;
        stack.insert(0, item.clone());
        self.write_schedule_stack(game, &stack).await
    }

    /// Replaces the entire stack with a single item (§4.7 `replace`).
    pub async fn replace_schedule(&self, game: i64, item: &ScheduleItem) -> HostResult<()> {
        self.write_schedule_stack(game, &[item.clone()]).await
    }

    /// Pops the top item; idempotent on an empty stack (§4.7 `drop`).
    pub async fn pop_schedule(&self, game: i64) -> HostResult<Option<ScheduleItem>> {
        let mut stack = self.get_schedule_stack(game).await?;
        if stack.is_empty() {
            return Ok(None);
        }
        let popped = stack.remove(0);
        self.write_schedule_stack(game, &stack).await?;
        Ok(Some(popped))
    }

    pub async fn replace_top_schedule(&self, game: i64, item: &ScheduleItem) -> HostResult<()> {
        let mut stack = self.get_schedule_stack(game).await?;
        if stack.is_empty() {
            stack.push(item.clone());
        } else {
            stack[0] = item.clone();
        }
        self.write_schedule_stack(game, &stack).await
    }

    pub async fn get_schedule_stack(&self, game: i64) -> HostResult<Vec<ScheduleItem>> {
        let raw = self.store.lrange(&schedule_key(game)).await?;
        Ok(raw
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect())
    }

    async fn write_schedule_stack(&self, game: i64, stack: &[ScheduleItem]) -> HostResult<()> {
        self.store.lclear(&schedule_key(game)).await?;
        for item in stack {
            let blob = serde_json::to_string(item).expect("ScheduleItem always serializes");
            self.store.rpush(&schedule_key(game), &blob).await?;
        }
        Ok(())
    }

    pub async fn put_tool(&self, tool: &Tool) -> HostResult<()> {
        let blob = serde_json::to_string(tool).expect("Tool always serializes");
        self.store.hset(&tool_hash(tool.kind), &tool.id, &blob).await?;
        if self.store.get(&tool_default_key(tool.kind)).await?.is_none() {
            self.store.set(&tool_default_key(tool.kind), &tool.id).await?;
        }
        Ok(())
    }

    pub async fn get_tool(&self, kind: ToolKind, id: &str) -> HostResult<Option<Tool>> {
        Ok(self
            .store
            .hget(&tool_hash(kind), id)
            .await?
            .and_then(|blob| serde_json::from_str(&blob).ok()))
    }

    pub async fn list_tools(&self, kind: ToolKind) -> HostResult<Vec<Tool>> {
        Ok(self
            .store
            .hgetall(&tool_hash(kind))
            .await?
            .into_values()
            .filter_map(|blob| serde_json::from_str(&blob).ok())
            .collect())
    }

    pub async fn remove_tool(&self, kind: ToolKind, id: &str) -> HostResult<bool> {
        let existed = self.get_tool(kind, id).await?.is_some();
        if existed {
            self.store.hdel(&tool_hash(kind), id).await?;
            if self.get_default_tool(kind).await?.as_deref() == Some(id) {
                self.store.del(&tool_default_key(kind)).await?;
                if let Some(next) = self.list_tools(kind).await?.first() {
                    self.store.set(&tool_default_key(kind), &next.id).await?;
                }
            }
        }
        Ok(existed)
    }

    pub async fn get_default_tool(&self, kind: ToolKind) -> HostResult<Option<String>> {
        self.store.get(&tool_default_key(kind)).await
    }

    pub async fn set_default_tool(&self, kind: ToolKind, id: &str) -> HostResult<()> {
        self.store.set(&tool_default_key(kind), id).await
    }

    pub async fn put_user(&self, user: &User) -> HostResult<()> {
        let blob = serde_json::to_string(user).expect("User always serializes");
        self.store.set(&user_key(&user.id), &blob).await
    }

    pub async fn get_user(&self, id: &str) -> HostResult<Option<User>> {
        Ok(self
            .store
            .get(&user_key(id))
            .await?
            .and_then(|blob| serde_json::from_str(&blob).ok()))
    }

    pub async fn user_game_ids(&self, user: &str) -> HostResult<Vec<i64>> {
        Ok(self
            .store
            .smembers(&format!("user:{user}:games"))
            .await?
            .into_iter()
            .filter_map(|s| s.parse().ok())
            .collect())
    }

    pub async fn current_daytimes(&self) -> HostResult<Vec<i64>> {
        let mut daytimes = Vec::new();
        for id in self.list_game_ids().await? {
            if let Some(game) = self.get_game(id).await? {
                if game.state != GameState::Deleted {
                    if let Some(top) = self.get_schedule_stack(id).await?.first() {
                        daytimes.push(top.daytime);
                    }
                }
            }
        }
        Ok(daytimes)
    }
}

fn game_member_ids(game: &Game) -> Vec<String> {
    let mut ids = vec![game.owner.clone()];
    ids.retain(|id| !id.is_empty());
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn view() -> GameStoreView {
        GameStoreView::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn schedule_stack_push_pop_and_replace() {
        let view = view();
        let item_a = ScheduleItem {
            daytime: 100,
            ..Default::default()
        };
        let item_b = ScheduleItem {
            daytime: 200,
            ..Default::default()
        };
        view.push_schedule(1, &item_a).await.unwrap();
        view.push_schedule(1, &item_b).await.unwrap();
        let stack = view.get_schedule_stack(1).await.unwrap();
        assert_eq!(stack[0].daytime, 200);
        assert_eq!(stack[1].daytime, 100);

        view.replace_schedule(1, &item_a).await.unwrap();
        let stack = view.get_schedule_stack(1).await.unwrap();
        assert_eq!(stack.len(), 1);

        let popped = view.pop_schedule(1).await.unwrap();
        assert!(popped.is_some());
        assert!(view.get_schedule_stack(1).await.unwrap().is_empty());
        assert!(view.pop_schedule(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_tool_added_becomes_default() {
        let view = view();
        let a = Tool {
            id: "a".into(),
            kind: ToolKind::Host,
            ..Default::default()
        };
        let b = Tool {
            id: "b".into(),
            kind: ToolKind::Host,
            ..Default::default()
        };
        view.put_tool(&a).await.unwrap();
        view.put_tool(&b).await.unwrap();
        assert_eq!(view.get_default_tool(ToolKind::Host).await.unwrap(), Some("a".into()));
    }

    #[tokio::test]
    async fn removing_default_tool_promotes_another() {
        let view = view();
        let a = Tool {
            id: "a".into(),
            kind: ToolKind::Host,
            ..Default::default()
        };
        let b = Tool {
            id: "b".into(),
            kind: ToolKind::Host,
            ..Default::default()
        };
        view.put_tool(&a).await.unwrap();
        view.put_tool(&b).await.unwrap();
        view.remove_tool(ToolKind::Host, "a").await.unwrap();
        assert_eq!(view.get_default_tool(ToolKind::Host).await.unwrap(), Some("b".into()));
    }
}
