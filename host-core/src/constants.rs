//! Service-wide constants, grouped the way `rbp-core` groups its game-tree
//! parameters: one banner comment per concern, one line per constant.

// ---------------------------------------------------------------------------
// SLOTS & GAMES
// ---------------------------------------------------------------------------

/// Maximum player slots a game may declare (matches the source's largest ruleset).
pub const MAX_SLOTS: u16 = 16;

// ---------------------------------------------------------------------------
// SCHEDULING
// ---------------------------------------------------------------------------

/// Default delay (scaled minutes) applied to a schedule item's host action
/// when the item omits one explicitly.
pub const DEFAULT_SCHEDULE_DELAY: i64 = 30;

/// Default `hostEarly` flag for newly-created schedule items.
pub const DEFAULT_HOST_EARLY: bool = true;

/// One scaled day, assuming the default timescale of 60 (minutes).
pub const MINUTES_PER_DAY: i64 = 60 * 24;

/// Minutes in a week, used by the weekly schedule type.
pub const MINUTES_PER_WEEK: i64 = MINUTES_PER_DAY * 7;

// ---------------------------------------------------------------------------
// SCORING
// ---------------------------------------------------------------------------

/// Base rank-points pool distributed across a finished game's slots.
pub const RANK_POINTS_BASE: i64 = 2000;

// ---------------------------------------------------------------------------
// RESILIENCE
// ---------------------------------------------------------------------------

/// `HOST.KICKAFTERMISSED` default: 0 disables automatic slot eviction.
pub const DEFAULT_KICK_AFTER_MISSED: u32 = 0;

/// Graded-shutdown escalation for the subprocess runner helper (§5): time,
/// in milliseconds, before sending SIGTERM after requesting a clean stop.
pub const SUBPROCESS_TERM_AFTER_MS: u64 = 500;

/// Time, in milliseconds, before escalating to SIGKILL.
pub const SUBPROCESS_KILL_AFTER_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// TURN STATES (§3) — stable wire-boundary values, never renumber.
// ---------------------------------------------------------------------------

pub const TURN_MISSING: u8 = 0;
pub const TURN_GREEN: u8 = 1;
pub const TURN_YELLOW: u8 = 2;
pub const TURN_RED: u8 = 3;
pub const TURN_BAD: u8 = 4;
pub const TURN_STALE: u8 = 5;
pub const TURN_NEEDLESS: u8 = 6;

/// OR'd into a turn state to mark it provisional.
pub const TURN_TEMPORARY_FLAG: u8 = 16;
