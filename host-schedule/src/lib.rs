//! The schedule engine (§4.2): a pure function over a game's top schedule
//! item, current turn, current time, and player readiness, producing the
//! next engine-run event or a terminal decision. The only impurity anywhere
//! in this crate is the caller-supplied "now" — given the same `ScheduleItem`
//! and `Context`, `next_event` always returns the same `Outcome`.

use host_core::MINUTES_PER_DAY;
use host_store::{EndCondition, ScheduleItem, ScheduleType};

/// Per-slot readiness as the schedule engine needs it: whether the slot is
/// occupied at all, and whether its current turn counts as "in" for the
/// purposes of host-early advancement.
#[derive(Debug, Clone, Copy)]
pub struct SlotReadiness {
    pub occupied: bool,
    pub ready: bool,
    pub temporary: bool,
}

/// Everything the engine needs besides the schedule item itself.
#[derive(Debug, Clone)]
pub struct Context {
    pub turn: i64,
    pub now: i64,
    /// Whether the master (universe generator) has already run once.
    pub mastered: bool,
    /// The absolute time the previous host/master action ran, used as the
    /// `daily` schedule's anchor. `None` before the game has ever run.
    pub last_run: Option<i64>,
    pub slots: Vec<SlotReadiness>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoEvent,
    Master(i64),
    Host(i64),
    /// The schedule's end condition is satisfied; no further events.
    Terminal,
}

/// Weekday bitmask bit for `weekly` schedules: bit 0 = Sunday, per the
/// source convention of numbering weekdays from Sunday.
pub fn weekday_bit(day: u8) -> i64 {
    1 << (day % 7)
}

pub fn next_event(item: &ScheduleItem, ctx: &Context) -> Outcome {
    if !ctx.mastered {
        return Outcome::Master(ctx.now);
    }

    let candidate = match item.kind {
        ScheduleType::Stop | ScheduleType::Manual => return Outcome::NoEvent,
        ScheduleType::Weekly => Some(next_weekly(item, ctx.now)),
        ScheduleType::Daily => Some(next_daily(item, ctx)),
        ScheduleType::Asap => {
            if all_non_temporary_ready(ctx) {
                Some(ctx.now + item.delay)
            } else {
                None
            }
        }
    };

    let Some(mut candidate) = candidate else {
        return Outcome::NoEvent;
    };

    if item.host_early && item.kind != ScheduleType::Asap && all_non_temporary_ready(ctx) {
        candidate = candidate.min(ctx.now + item.delay).max(ctx.now);
    }

    if is_terminal(item, ctx.turn + 1, candidate) {
        return Outcome::Terminal;
    }

    Outcome::Host(candidate)
}

fn all_non_temporary_ready(ctx: &Context) -> bool {
    ctx.slots
        .iter()
        .filter(|s| s.occupied && !s.temporary)
        .all(|s| s.ready)
}

fn next_weekly(item: &ScheduleItem, now: i64) -> i64 {
    let daytime = item.daytime.rem_euclid(MINUTES_PER_DAY);
    let mask = item.interval_or_weekdays;
    if mask == 0 {
        // No weekday enabled: behave like a far-future no-op that preview/
        // the caller will never actually reach in practice.
        return now + host_core::MINUTES_PER_WEEK;
    }
    let day_of_week = (now / MINUTES_PER_DAY) % 7;
    let start_of_today = (now / MINUTES_PER_DAY) * MINUTES_PER_DAY;
    for offset in 0..7 {
        let day = (day_of_week + offset) % 7;
        if mask & weekday_bit(day as u8) != 0 {
            let candidate = start_of_today + offset * MINUTES_PER_DAY + daytime;
            if candidate > now {
                return candidate;
            }
        }
    }
    // Every enabled day has already passed today; take the first next week.
    for offset in 1..=7 {
        let day = (day_of_week + offset) % 7;
        if mask & weekday_bit(day as u8) != 0 {
            return start_of_today + offset * MINUTES_PER_DAY + daytime;
        }
    }
    now + host_core::MINUTES_PER_WEEK
}

fn next_daily(item: &ScheduleItem, ctx: &Context) -> i64 {
    let interval = item.interval_or_weekdays.max(1) * MINUTES_PER_DAY;
    let anchor = ctx.last_run.unwrap_or(ctx.now);
    let mut candidate = anchor + interval;
    while candidate <= ctx.now {
        candidate += interval;
    }
    candidate
}

fn is_terminal(item: &ScheduleItem, next_turn: i64, candidate_time: i64) -> bool {
    match item.end_condition {
        EndCondition::None | EndCondition::Forever => false,
        EndCondition::Turn => next_turn > item.end_parameter,
        EndCondition::Time => candidate_time > item.end_parameter,
    }
}

/// Simulates the engine forward from the current state (§4.7 `preview`),
/// producing up to `turn_limit` absolute host times (plus a leading master
/// time if the game has not yet been mastered), stopping at the first
/// terminal decision or when `time_limit` is exceeded. Player readiness is
/// simulated as immediately ready, since preview reasons about policy timing
/// only, not player behavior.
pub fn preview(
    item: &ScheduleItem,
    mut turn: i64,
    mut now: i64,
    mut mastered: bool,
    time_limit: Option<i64>,
    turn_limit: Option<u32>,
) -> Vec<i64> {
    let Some(turn_limit) = turn_limit else {
        return Vec::new();
    };
    let mut times = Vec::new();
    let mut last_run = None;
    let all_ready = vec![SlotReadiness {
        occupied: true,
        ready: true,
        temporary: false,
    }];

    while (times.len() as u32) < turn_limit.saturating_add(1) {
        let ctx = Context {
            turn,
            now,
            mastered,
            last_run,
            slots: all_ready.clone(),
        };
        match next_event(item, &ctx) {
            Outcome::NoEvent | Outcome::Terminal => break,
            Outcome::Master(t) => {
                if let Some(limit) = time_limit {
                    if t > limit {
                        break;
                    }
                }
                times.push(t);
                mastered = true;
                last_run = Some(t);
                now = t;
            }
            Outcome::Host(t) => {
                if let Some(limit) = time_limit {
                    if t > limit {
                        break;
                    }
                }
                times.push(t);
                turn += 1;
                last_run = Some(t);
                now = t;
                if times.len() as u32 > turn_limit {
                    break;
                }
            }
        }
    }
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_store::ScheduleItem;

    fn daily_item(interval: i64, end_turn: i64) -> ScheduleItem {
        ScheduleItem {
            kind: ScheduleType::Daily,
            interval_or_weekdays: interval,
            daytime: 0,
            delay: 30,
            host_early: false,
            end_condition: EndCondition::Turn,
            end_parameter: end_turn,
        }
    }

    #[test]
    fn never_mastered_emits_master_first() {
        let item = daily_item(3, 10);
        let ctx = Context {
            turn: 0,
            now: 1000,
            mastered: false,
            last_run: None,
            slots: vec![],
        };
        assert_eq!(next_event(&item, &ctx), Outcome::Master(1000));
    }

    #[test]
    fn daily_advances_by_interval_days() {
        let item = daily_item(3, 100);
        let ctx = Context {
            turn: 1,
            now: 1000,
            mastered: true,
            last_run: Some(1000),
            slots: vec![],
        };
        let Outcome::Host(t) = next_event(&item, &ctx) else {
            panic!("expected host event")
        };
        assert_eq!(t, 1000 + 3 * MINUTES_PER_DAY);
    }

    #[test]
    fn end_condition_turn_triggers_terminal() {
        let item = daily_item(3, 5);
        let ctx = Context {
            turn: 5,
            now: 1000,
            mastered: true,
            last_run: Some(1000),
            slots: vec![],
        };
        assert_eq!(next_event(&item, &ctx), Outcome::Terminal);
    }

    #[test]
    fn preview_produces_eleven_times_spaced_three_days() {
        let item = daily_item(3, 10);
        let times = preview(&item, 0, 0, false, None, Some(100));
        assert_eq!(times.len(), 11, "expected master + 10 host turns, got {times:?}");
        for pair in times[1..].windows(2) {
            assert_eq!(pair[1] - pair[0], 3 * MINUTES_PER_DAY);
        }
    }

    #[test]
    fn unlimited_preview_is_refused() {
        let item = daily_item(3, 10);
        assert!(preview(&item, 0, 0, false, None, None).is_empty());
    }
}
