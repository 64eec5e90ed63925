//! Universal verbs (§4.8): `PING`, `HELP [topic]`, `USER uid`. These are
//! tried before any family handler since they act on the session itself
//! rather than a domain object.

use crate::args::Args;
use host_auth::Session;
use host_core::HostResult;
use host_wire::Value;

const MAIN_PAGE: &str = "\
commands: PING USER NEWGAME GAMECLONE GAMESETSTATE GAMESETTYPE GAMESETNAME \
GAMELIST GAMESTAT GAMEGETCONFIG GAMESETCONFIG GAMEADDTOOL GAMEREMOVETOOL \
GAMEPERMS PLAYERJOIN PLAYERSUBST PLAYERRESIGN PLAYERADD PLAYERLS PLAYERSETDIR \
PLAYERCHECKFILE TRN TRNMARKTEMP SCHEDULEADD SCHEDULEREPLACE SCHEDULEMODIFY \
SCHEDULEDROP SCHEDULELIST SCHEDULEPREVIEW HOSTADD MASTERADD SHIPLISTADD \
TOOLADD CRONGET CRONLIST CRONKICK CRONSUSPEND\n\
use HELP <topic> for a topic page; unknown topics show this page.";

const TOPICS: &[(&str, &str)] = &[
    ("game", "game family: NEWGAME GAMECLONE GAMESETSTATE GAMESETTYPE GAMESETNAME GAMELIST GAMESTAT GAMEGETCONFIG GAMESETCONFIG GAMEADDTOOL GAMEREMOVETOOL GAMEPERMS"),
    ("player", "player family: PLAYERJOIN PLAYERSUBST PLAYERRESIGN PLAYERADD PLAYERLS PLAYERSETDIR PLAYERCHECKFILE"),
    ("turn", "turn family: TRN TRNMARKTEMP"),
    ("schedule", "schedule family: SCHEDULEADD SCHEDULEREPLACE SCHEDULEMODIFY SCHEDULEDROP SCHEDULELIST SCHEDULEPREVIEW"),
    ("tool", "catalog family: HOSTADD/GET/LIST/REMOVE/SETDEFAULT/COPY/DIFFICULTY, and MASTER*/SHIPLIST*/TOOL* equivalents"),
    ("cron", "cron family: CRONGET CRONLIST CRONKICK CRONSUSPEND"),
];

/// Returns `Some` when `verb` is one of the universal verbs, handling it
/// against `session` directly.
pub fn try_dispatch(verb: &str, args: &mut Args, session: &mut Session) -> Option<HostResult<Value>> {
    match verb {
        "PING" => Some(Ok(Value::pong())),
        "HELP" => Some(help(args)),
        "USER" => Some(user(args, session)),
        _ => None,
    }
}

fn help(args: &mut Args) -> HostResult<Value> {
    if args.is_empty() {
        return Ok(Value::String(MAIN_PAGE.to_string()));
    }
    let topic = args.string()?.to_ascii_lowercase();
    let page = TOPICS
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, page)| *page)
        .unwrap_or(MAIN_PAGE);
    Ok(Value::String(page.to_string()))
}

fn user(args: &mut Args, session: &mut Session) -> HostResult<Value> {
    let uid = if args.is_empty() { String::new() } else { args.string()? };
    session.set_user(uid);
    Ok(Value::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn ping_replies_pong() {
        let mut session = Session::admin();
        let raw = args(&[]);
        let mut a = Args::new(&raw);
        assert_eq!(try_dispatch("PING", &mut a, &mut session).unwrap().unwrap(), Value::pong());
    }

    #[test]
    fn user_with_empty_string_reverts_to_admin() {
        let mut session = Session::as_user("ua");
        let raw = args(&[""]);
        let mut a = Args::new(&raw);
        try_dispatch("USER", &mut a, &mut session).unwrap().unwrap();
        assert!(session.is_admin());
    }

    #[test]
    fn help_falls_back_to_main_page_for_unknown_topic() {
        let mut session = Session::admin();
        let raw = args(&["nonsense"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("HELP", &mut a, &mut session).unwrap().unwrap();
        assert_eq!(reply, Value::String(MAIN_PAGE.to_string()));
    }

    #[test]
    fn help_with_known_topic_returns_topic_page() {
        let mut session = Session::admin();
        let raw = args(&["cron"]);
        let mut a = Args::new(&raw);
        let reply = try_dispatch("HELP", &mut a, &mut session).unwrap().unwrap();
        assert!(matches!(reply, Value::String(s) if s.starts_with("cron family")));
    }
}
