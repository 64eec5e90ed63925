//! The persistence layer (§2 "Game store view", §10 "Persistence backend"):
//! a swappable `Store` trait over the external key/value collaborator, and
//! `GameStoreView`, the typed accessor layer every domain operation goes
//! through instead of touching string keys directly.

mod memory;
mod model;
mod redis_store;
mod store;
mod view;

pub use memory::MemoryStore;
pub use model::{
    EndCondition, Game, GameState, GameType, ScheduleItem, ScheduleType, Slot, Tool, ToolKind,
    TurnState, User,
};
pub use redis_store::RedisStore;
pub use store::Store;
pub use view::GameStoreView;
