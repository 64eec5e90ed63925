//! Game/player/turn/schedule domain operations and the tool catalog (§4):
//! the business-rule layer sitting between the wire dispatcher and the
//! key-value store. Depends only on `host-store`/`host-auth`/`host-schedule`/
//! `host-subprocess` plus the `collaborators` traits it defines itself, so
//! that `host-scheduler` and `host-dispatch` can both depend on it without a
//! cycle.

mod catalog;
mod collaborators;
mod game;
mod player;
mod schedule;
mod turn;

pub use catalog::ToolCatalog;
pub use collaborators::{
    FileMeta, FileService, Forum, MailQueue, MemoryFileService, NullForum, NullMailQueue, NullScheduleNotifier,
    NullSessionRouter, ScheduleNotifier, SessionRouter,
};
pub use game::{GameDomain, GameFilter};
pub use player::{FileDecision, PlayerDomain};
pub use schedule::{ScheduleDomain, SchedulePatch};
pub use turn::{SubmitRequest, SubmitResult, TurnDomain};
