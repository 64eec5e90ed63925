use host_core::{TURN_BAD, TURN_GREEN, TURN_MISSING, TURN_NEEDLESS, TURN_RED, TURN_STALE, TURN_TEMPORARY_FLAG, TURN_YELLOW};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    Public,
    Unlisted,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Preparing,
    Joining,
    Running,
    Finished,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    Host,
    Master,
    Shiplist,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleType {
    Stop,
    Weekly,
    Daily,
    Asap,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCondition {
    None,
    Turn,
    Time,
    Forever,
}

/// A raw turn-state byte as it crosses the boundary (§3): one of the seven
/// stable codes, optionally OR'd with the temporary-flag bit (16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState(pub u8);

impl TurnState {
    pub const MISSING: TurnState = TurnState(TURN_MISSING);
    pub const GREEN: TurnState = TurnState(TURN_GREEN);
    pub const YELLOW: TurnState = TurnState(TURN_YELLOW);
    pub const RED: TurnState = TurnState(TURN_RED);
    pub const BAD: TurnState = TurnState(TURN_BAD);
    pub const STALE: TurnState = TurnState(TURN_STALE);
    pub const NEEDLESS: TurnState = TurnState(TURN_NEEDLESS);

    pub fn base(self) -> u8 {
        self.0 & !TURN_TEMPORARY_FLAG
    }

    pub fn is_temporary(self) -> bool {
        self.0 & TURN_TEMPORARY_FLAG != 0
    }

    pub fn with_temporary(self, flag: bool) -> TurnState {
        if flag {
            TurnState(self.base() | TURN_TEMPORARY_FLAG)
        } else {
            TurnState(self.base())
        }
    }

    /// Whether this base state counts as a successful submission for
    /// "host early" purposes (§4.2): green or yellow.
    pub fn is_ready(self) -> bool {
        matches!(self.base(), TURN_GREEN | TURN_YELLOW)
    }

    pub fn from_checker_exit(code: i32) -> TurnState {
        match code {
            0 => TurnState::GREEN,
            1 => TurnState::YELLOW,
            2 => TurnState::RED,
            3 => TurnState::BAD,
            4 => TurnState::STALE,
            5 => TurnState::NEEDLESS,
            _ => TurnState::BAD,
        }
    }
}

impl Default for TurnState {
    fn default() -> Self {
        TurnState::MISSING
    }
}

/// A player-slot of a game (§3). `chain[0]` is the primary; later entries are
/// substitutes in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slot {
    pub number: u16,
    pub chain: Vec<String>,
    pub state: TurnState,
    pub rank: Option<u32>,
    pub rank_points: Option<i64>,
}

impl Slot {
    pub fn is_occupied(&self) -> bool {
        !self.chain.is_empty()
    }

    pub fn primary(&self) -> Option<&str> {
        self.chain.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub kind: ScheduleType,
    /// `daily`: interval in days. `weekly`: bitmask of enabled weekdays (bit 0 = Sunday).
    pub interval_or_weekdays: i64,
    /// Minutes within a day (§3 "Daytime").
    pub daytime: i64,
    pub delay: i64,
    pub host_early: bool,
    pub end_condition: EndCondition,
    pub end_parameter: i64,
}

impl Default for ScheduleItem {
    fn default() -> Self {
        Self {
            kind: ScheduleType::Manual,
            interval_or_weekdays: 0,
            daytime: 0,
            delay: host_core::DEFAULT_SCHEDULE_DELAY,
            host_early: host_core::DEFAULT_HOST_EARLY,
            end_condition: EndCondition::None,
            end_parameter: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub kind: ToolKind,
    pub path: Option<String>,
    pub executable: Option<String>,
    pub description: String,
    pub difficulty: Option<u32>,
    pub extra_files_restricted: bool,
}

impl Default for ToolKind {
    fn default() -> Self {
        ToolKind::Generic
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub name: String,
    pub game_type: GameTypeOrDefault,
    pub state: GameStateOrDefault,
    pub owner: String,
    pub directory: String,
    pub turn: i64,
    pub timestamp: String,
    pub tools: BTreeMap<ToolKind, String>,
    pub extra_tools: Vec<String>,
    pub config: BTreeMap<String, String>,
    pub difficulty: Option<u32>,
    pub copy_of: Option<i64>,
    pub config_changed: bool,
    pub end_changed: bool,
    /// Absolute scaled-minutes time of the last master/host run, used as the
    /// `daily` schedule type's anchor (§4.2). `None` before the first run.
    pub last_run: Option<i64>,
}

/// Newtype wrappers so `Game` can `#[derive(Default)]` without every enum
/// needing a semantically-meaningless `Default` impl of its own elsewhere.
pub type GameTypeOrDefault = GameType;
pub type GameStateOrDefault = GameState;

impl Default for GameType {
    fn default() -> Self {
        GameType::Private
    }
}
impl Default for GameState {
    fn default() -> Self {
        GameState::Preparing
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub allow_join: bool,
    pub rank: Option<u32>,
    pub rank_points: i64,
    pub turns_played: u32,
    pub turns_missed: u32,
    /// 0.0-1.0 historical turn-submission reliability, used by the rank multiplier (§4.4).
    pub reliability: f32,
}

impl User {
    /// `reliability` as the rank multiplier should read it: a user with no
    /// submission history yet has no evidence against them, so this reads as
    /// neutral (1.0) rather than the zeroed `Default` value.
    pub fn effective_reliability(&self) -> f32 {
        if self.turns_played + self.turns_missed == 0 {
            1.0
        } else {
            self.reliability
        }
    }

    /// Records one submission outcome (§4.6 `TurnDomain::submit`): a
    /// ready (green/yellow) turn counts as played, anything else as missed,
    /// and `reliability` is recomputed as the played fraction of the total.
    pub fn record_submission(&mut self, ready: bool) {
        if ready {
            self.turns_played += 1;
        } else {
            self.turns_missed += 1;
        }
        let total = self.turns_played + self.turns_missed;
        self.reliability = self.turns_played as f32 / total as f32;
    }
}
