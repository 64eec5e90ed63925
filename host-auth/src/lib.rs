//! The session model (§4.9): a connection-scoped identity and the per-game
//! permission bits (§4.4) that domain operations check against it.
//!
//! The source models sessions behind a token/JWT handshake appropriate to its
//! web-facing API; this service's session is the trivial model the spec
//! actually calls for — an opaque user id set by the `USER` verb, with the
//! empty string meaning administrator — so no token crate is carried over
//! here (see DESIGN.md for that drop and its justification).

use host_core::{HostError, HostResult};
use host_store::{Game, GameType, Slot};

/// Per-connection state (§3 "Session").
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Empty means administrator.
    user: String,
}

impl Session {
    pub fn admin() -> Self {
        Self { user: String::new() }
    }

    pub fn as_user(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_empty()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// `USER uid`: empty reverts to admin.
    pub fn set_user(&mut self, uid: impl Into<String>) {
        self.user = uid.into();
    }

    pub fn check_admin(&self) -> HostResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(HostError::Forbidden("admin privileges required".into()))
        }
    }

    pub fn check_permission(&self, bits: &PermissionBits, level: Permission) -> HostResult<()> {
        if self.is_admin() {
            return Ok(());
        }
        let allowed = match level {
            Permission::Read => bits.is_public || bits.joinable_unlisted || bits.is_owner || bits.is_active,
            Permission::Modify => bits.is_owner,
        };
        if allowed {
            Ok(())
        } else {
            Err(HostError::Forbidden(format!(
                "user {} lacks {level:?} permission",
                self.user
            )))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Permission {
    Read,
    Modify,
}

/// The per-user bits a game exposes (§4.4 "Permissions").
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionBits {
    pub is_primary: bool,
    pub is_active: bool,
    pub is_inactive: bool,
    pub is_owner: bool,
    pub is_public: bool,
    pub joinable_unlisted: bool,
}

/// Computes the bits for `user` against `game`/`slots`. `joinable` indicates
/// whether the game is presently accepting joins (state in {preparing, joining}),
/// used for the "joinable unlisted games" read-permission clause.
pub fn compute_bits(game: &Game, slots: &[Slot], user: &str, joinable: bool) -> PermissionBits {
    let mut bits = PermissionBits {
        is_owner: game.owner == user,
        is_public: game.game_type == GameType::Public,
        joinable_unlisted: joinable && game.game_type == GameType::Unlisted,
        ..Default::default()
    };
    for slot in slots {
        match slot.chain.iter().position(|u| u == user) {
            Some(0) => {
                bits.is_primary = true;
                bits.is_active = true;
            }
            Some(_) => bits.is_active = true,
            None => {}
        }
    }
    if !bits.is_active {
        // "past-only" membership (a replaced-out user still on no live
        // slot but recorded historically) is not modeled as live chain
        // membership here, so inactive is simply "not active and not owner".
        bits.is_inactive = !bits.is_owner && user_is_known_past_member(game, user);
    }
    bits
}

fn user_is_known_past_member(game: &Game, user: &str) -> bool {
    game.config
        .get(&format!("pastmember.{user}"))
        .map(|v| v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_store::GameState;

    fn game(owner: &str, kind: GameType) -> Game {
        Game {
            owner: owner.to_string(),
            game_type: kind,
            state: GameState::Joining,
            ..Default::default()
        }
    }

    fn slot(chain: &[&str]) -> Slot {
        Slot {
            number: 1,
            chain: chain.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn public_game_is_readable_by_anyone() {
        let g = game("owner", GameType::Public);
        let bits = compute_bits(&g, &[], "stranger", true);
        let session = Session::as_user("stranger");
        assert!(session.check_permission(&bits, Permission::Read).is_ok());
    }

    #[test]
    fn private_game_rejects_non_member() {
        let g = game("owner", GameType::Private);
        let bits = compute_bits(&g, &[], "stranger", true);
        let session = Session::as_user("stranger");
        assert!(session.check_permission(&bits, Permission::Read).is_err());
    }

    #[test]
    fn active_member_may_read_private_game() {
        let g = game("owner", GameType::Private);
        let bits = compute_bits(&g, &[slot(&["ua"])], "ua", true);
        let session = Session::as_user("ua");
        assert!(session.check_permission(&bits, Permission::Read).is_ok());
    }

    #[test]
    fn admin_bypasses_every_check() {
        let g = game("owner", GameType::Private);
        let bits = compute_bits(&g, &[], "nobody", false);
        let session = Session::admin();
        assert!(session.check_permission(&bits, Permission::Read).is_ok());
        assert!(session.check_admin().is_ok());
    }
}
