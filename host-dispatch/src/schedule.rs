//! Schedule family (§4.7, §6): `SCHEDULEADD`, `SCHEDULEREPLACE`,
//! `SCHEDULEMODIFY`, `SCHEDULEDROP`, `SCHEDULELIST`, `SCHEDULEPREVIEW`.

use crate::args::{find_opt, Args};
use host_core::HostResult;
use host_domain::{ScheduleDomain, SchedulePatch};
use host_store::{EndCondition, ScheduleItem, ScheduleType};
use host_wire::Value;
use std::sync::Arc;

pub async fn try_dispatch(
    verb: &str,
    args: &mut Args<'_>,
    schedules: &Arc<ScheduleDomain>,
    now: i64,
) -> Option<HostResult<Value>> {
    let result = match verb {
        "SCHEDULEADD" => add(args, schedules).await,
        "SCHEDULEREPLACE" => replace(args, schedules).await,
        "SCHEDULEMODIFY" => modify(args, schedules).await,
        "SCHEDULEDROP" => drop_top(args, schedules).await,
        "SCHEDULELIST" => list(args, schedules).await,
        "SCHEDULEPREVIEW" => preview(args, schedules, now).await,
        _ => return None,
    };
    Some(result)
}

/// `SCHEDULEADD gid [KIND daily] [INTERVAL n] [DAYTIME n] [DELAY n]
/// [HOSTEARLY 0/1] [ENDCONDITION turn] [ENDPARAM n]` (§6 "sched-spec").
fn parse_patch(pairs: &[(String, String)]) -> HostResult<SchedulePatch> {
    Ok(SchedulePatch {
        kind: find_opt(pairs, "KIND").map(parse_kind).transpose()?,
        interval_or_weekdays: find_opt(pairs, "INTERVAL").map(parse_i64).transpose()?,
        daytime: find_opt(pairs, "DAYTIME").map(parse_i64).transpose()?,
        delay: find_opt(pairs, "DELAY").map(parse_i64).transpose()?,
        host_early: find_opt(pairs, "HOSTEARLY").map(|v| Ok::<_, host_core::HostError>(v == "1")).transpose()?,
        end_condition: find_opt(pairs, "ENDCONDITION").map(parse_end).transpose()?,
        end_parameter: find_opt(pairs, "ENDPARAM").map(parse_i64).transpose()?,
    })
}

async fn add(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let patch = parse_patch(&args.remaining_pairs()?)?;
    schedules.add(game, &patch).await?;
    Ok(Value::ok())
}

async fn replace(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let patch = parse_patch(&args.remaining_pairs()?)?;
    schedules.replace(game, &patch).await?;
    Ok(Value::ok())
}

async fn modify(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let patch = parse_patch(&args.remaining_pairs()?)?;
    schedules.modify(game, &patch).await?;
    Ok(Value::ok())
}

async fn drop_top(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    schedules.drop_top(game).await?;
    Ok(Value::ok())
}

async fn list(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>) -> HostResult<Value> {
    let game = args.i64()?;
    let items = schedules.get_all(game).await?;
    Ok(Value::Array(items.iter().map(item_to_value).collect()))
}

/// `SCHEDULEPREVIEW gid turn [TIMELIMIT n] TURNLIMIT n` (§4.7 "preview").
async fn preview(args: &mut Args<'_>, schedules: &Arc<ScheduleDomain>, now: i64) -> HostResult<Value> {
    let game = args.i64()?;
    let turn = args.i64()?;
    let pairs = args.remaining_pairs()?;
    let time_limit = find_opt(&pairs, "TIMELIMIT").map(parse_i64).transpose()?;
    let turn_limit = find_opt(&pairs, "TURNLIMIT")
        .map(|v| v.parse::<u32>().map_err(|_| host_core::HostError::BadRequest("TURNLIMIT must be an integer".into())))
        .transpose()?;
    let mastered = turn > 0;
    let times = schedules.preview(game, turn, now, mastered, time_limit, turn_limit).await?;
    Ok(Value::from(times))
}

fn item_to_value(item: &ScheduleItem) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("kind".to_string(), Value::String(format!("{:?}", item.kind).to_lowercase()));
    map.insert("interval".to_string(), Value::Integer(item.interval_or_weekdays));
    map.insert("daytime".to_string(), Value::Integer(item.daytime));
    map.insert("delay".to_string(), Value::Integer(item.delay));
    map.insert("hostearly".to_string(), Value::bool(item.host_early));
    map.insert("endcondition".to_string(), Value::String(format!("{:?}", item.end_condition).to_lowercase()));
    map.insert("endparam".to_string(), Value::Integer(item.end_parameter));
    Value::Map(map)
}

fn parse_i64(raw: &str) -> HostResult<i64> {
    raw.parse().map_err(|_| host_core::HostError::BadRequest(format!("expected an integer, got {raw:?}")))
}

fn parse_kind(raw: &str) -> HostResult<ScheduleType> {
    match raw.to_ascii_lowercase().as_str() {
        "stop" => Ok(ScheduleType::Stop),
        "weekly" => Ok(ScheduleType::Weekly),
        "daily" => Ok(ScheduleType::Daily),
        "asap" => Ok(ScheduleType::Asap),
        "manual" => Ok(ScheduleType::Manual),
        other => Err(host_core::HostError::BadRequest(format!("unknown schedule kind {other:?}"))),
    }
}

fn parse_end(raw: &str) -> HostResult<EndCondition> {
    match raw.to_ascii_lowercase().as_str() {
        "none" => Ok(EndCondition::None),
        "turn" => Ok(EndCondition::Turn),
        "time" => Ok(EndCondition::Time),
        "forever" => Ok(EndCondition::Forever),
        other => Err(host_core::HostError::BadRequest(format!("unknown end condition {other:?}"))),
    }
}
