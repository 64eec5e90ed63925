use std::fmt;

/// The error taxonomy surfaced at the wire (§7). Every family handler returns
/// `Result<Value, HostError>`; the dispatcher turns the `Err` arm into a status-
/// code-prefixed error response and never matches on it beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// 400 — malformed request or bad option.
    BadRequest(String),
    /// 403 — permission denied.
    Forbidden(String),
    /// 404 — object not found (game, user, file).
    NotFound(String),
    /// 407 — mail address does not match player.
    MailMismatch(String),
    /// 409 — conflict (id already taken; slot occupied).
    Conflict(String),
    /// 412 — wrong state (game not in required state; slot not in use).
    WrongState(String),
    /// 601 — directory already in use by another game.
    DirectoryInUse(String),
}

impl HostError {
    pub fn code(&self) -> u16 {
        match self {
            HostError::BadRequest(_) => 400,
            HostError::Forbidden(_) => 403,
            HostError::NotFound(_) => 404,
            HostError::MailMismatch(_) => 407,
            HostError::Conflict(_) => 409,
            HostError::WrongState(_) => 412,
            HostError::DirectoryInUse(_) => 601,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            HostError::BadRequest(m)
            | HostError::Forbidden(m)
            | HostError::NotFound(m)
            | HostError::MailMismatch(m)
            | HostError::Conflict(m)
            | HostError::WrongState(m)
            | HostError::DirectoryInUse(m) => m,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

impl std::error::Error for HostError {}

pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_table() {
        assert_eq!(HostError::BadRequest("x".into()).code(), 400);
        assert_eq!(HostError::Forbidden("x".into()).code(), 403);
        assert_eq!(HostError::NotFound("x".into()).code(), 404);
        assert_eq!(HostError::MailMismatch("x".into()).code(), 407);
        assert_eq!(HostError::Conflict("x".into()).code(), 409);
        assert_eq!(HostError::WrongState("x".into()).code(), 412);
        assert_eq!(HostError::DirectoryInUse("x".into()).code(), 601);
    }

    #[test]
    fn display_prefixes_code() {
        let e = HostError::NotFound("game 9".into());
        assert_eq!(e.to_string(), "404 game 9");
    }
}
