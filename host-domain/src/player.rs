//! Player domain operations (§4.5): join, substitute, resign, add (grant
//! access without a slot), managed-directory mapping, and the upload-path
//! `checkFile` classifier.

use crate::collaborators::{FileService, ScheduleNotifier};
use host_auth::Session;
use host_core::{HostError, HostResult};
use host_store::{GameState, GameStoreView, Slot, User};
use std::sync::Arc;

pub struct PlayerDomain {
    store: Arc<GameStoreView>,
    user_files: Arc<dyn FileService>,
    notifier: Arc<dyn ScheduleNotifier>,
}

/// The result of `checkFile` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecision {
    Allow,
    Refuse,
    Stale,
    Turn(u16),
}

/// Filenames the service manages itself and will not let a player overwrite
/// directly (§4.5 `checkFile` "refuse" case).
const GAME_CONTROLLED_FILES: &[&str] = &["result.trn", "spec.rst", "game.rst", "turn.log"];

impl PlayerDomain {
    pub fn new(store: Arc<GameStoreView>, user_files: Arc<dyn FileService>, notifier: Arc<dyn ScheduleNotifier>) -> Self {
        Self {
            store,
            user_files,
            notifier,
        }
    }

    /// (§4.5 "Join"). `session` determines whether this is an admin
    /// assigning any user, or a regular user joining themselves.
    pub async fn join(&self, session: &Session, game: i64, slot_number: u16, user_id: &str) -> HostResult<()> {
        let g = self
            .store
            .get_game(game)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {game}")))?;
        if !matches!(g.state, GameState::Preparing | GameState::Joining | GameState::Running) {
            return Err(HostError::WrongState(format!("game {game} is not accepting joins")));
        }
        if !session.is_admin() && session.user() != user_id {
            return Err(HostError::Forbidden("users may only join themselves".into()));
        }
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("user {user_id}")))?;
        if !user.allow_join {
            return Err(HostError::Forbidden(format!("user {user_id} is not allowed to join")));
        }

        let mut slot = self.store.get_slot(game, slot_number).await?;
        if slot.is_occupied() {
            return Err(HostError::Conflict(format!("slot {slot_number} is occupied")));
        }
        if !session.is_admin() {
            let joinable = matches!(g.game_type, host_store::GameType::Public | host_store::GameType::Unlisted);
            if !joinable {
                return Err(HostError::Forbidden("game is not open for self-join".into()));
            }
            let already_on_game = self
                .store
                .get_slots(game, host_core::MAX_SLOTS)
                .await?
                .iter()
                .any(|s| s.chain.iter().any(|u| u == user_id));
            if already_on_game {
                return Err(HostError::Conflict(format!("{user_id} is already on game {game}")));
            }
        }

        slot.chain = vec![user_id.to_string()];
        slot.state = host_store::TurnState::MISSING;
        self.store.put_slot(game, &slot).await?;
        self.notifier.handle_game_change(game).await;
        Ok(())
    }

    /// (§4.5 "Substitute"). Truncates the chain at the caller's position and
    /// appends `new_user`, who must not already appear earlier in the chain.
    pub async fn substitute(&self, session: &Session, game: i64, slot_number: u16, new_user: &str) -> HostResult<()> {
        let mut slot = self.store.get_slot(game, slot_number).await?;
        if !slot.is_occupied() {
            return Err(HostError::WrongState(format!("slot {slot_number} is not in use")));
        }
        let caller_position = self.caller_position(session, &slot)?;
        if slot.chain[..=caller_position].iter().any(|u| u == new_user) {
            return Err(HostError::Conflict(format!(
                "{new_user} is already earlier in the chain"
            )));
        }
        let dropped = slot.chain.split_off(caller_position + 1);
        slot.chain.push(new_user.to_string());
        self.store.put_slot(game, &slot).await?;
        self.mark_past_members(game, &dropped).await?;
        self.notifier.handle_game_change(game).await;
        Ok(())
    }

    /// (§4.5 "Resign"). Resigning the primary empties the whole chain;
    /// resigning a later entry removes it and everyone after.
    pub async fn resign(&self, session: &Session, game: i64, slot_number: u16, user_id: &str) -> HostResult<()> {
        let mut slot = self.store.get_slot(game, slot_number).await?;
        if !slot.is_occupied() {
            return Err(HostError::WrongState(format!("slot {slot_number} is not in use")));
        }
        let g = self
            .store
            .get_game(game)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {game}")))?;
        let is_privileged = session.is_admin() || session.user() == g.owner;
        let position = slot
            .chain
            .iter()
            .position(|u| u == user_id)
            .ok_or_else(|| HostError::NotFound(format!("{user_id} is not on slot {slot_number}")))?;
        if !is_privileged && session.user() != user_id {
            return Err(HostError::Forbidden("may only resign yourself or your own substitutes".into()));
        }
        let dropped = slot.chain.split_off(position);
        self.store.put_slot(game, &slot).await?;
        self.mark_past_members(game, &dropped).await?;
        self.notifier.handle_game_change(game).await;
        Ok(())
    }

    /// Records users dropped from a live chain (by resign or substitute) as
    /// "past members" (§4.4 "Permissions" `UserIsInactive`): `Session`'s
    /// `compute_bits` reads `pastmember.{user}` back out of `game.config` to
    /// distinguish "only past in a chain" from a stranger who was never on
    /// the game.
    async fn mark_past_members(&self, game: i64, users: &[String]) -> HostResult<()> {
        if users.is_empty() {
            return Ok(());
        }
        let mut g = self
            .store
            .get_game(game)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {game}")))?;
        for user in users {
            g.config.insert(format!("pastmember.{user}"), "1".to_string());
        }
        self.store.put_game(&g).await
    }

    /// (§4.5 "Add (allow access)"). Admin-only: marks `user_id` as permitted
    /// to see `game` without putting them on a slot.
    pub async fn grant_access(&self, session: &Session, game: i64, user_id: &str) -> HostResult<()> {
        session.check_admin()?;
        let mut g = self
            .store
            .get_game(game)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {game}")))?;
        g.config.insert(format!("access.{user_id}"), "1".to_string());
        self.store.put_game(&g).await
    }

    /// (§4.5 "Managed directory"). Validates the directory exists, is owned
    /// by `user_id`, and is not already managed by a different game, then
    /// records the mapping (clearing any previous path's property).
    pub async fn set_managed_directory(
        &self,
        game: i64,
        user_id: &str,
        new_path: &str,
        previous_path: Option<&str>,
    ) -> HostResult<()> {
        if !self.user_files.exists(new_path).await? {
            return Err(HostError::NotFound(format!("directory {new_path}")));
        }
        if self.user_files.owner_of(new_path).await?.as_deref() != Some(user_id) {
            return Err(HostError::Forbidden(format!("{new_path} is not owned by {user_id}")));
        }
        match self.user_files.managed_by(new_path).await? {
            Some(existing) if existing != game => {
                return Err(HostError::DirectoryInUse(format!(
                    "{new_path} is already managed by game {existing}"
                )));
            }
            _ => {}
        }
        self.user_files.set_managed_by(new_path, Some(game)).await?;
        if let Some(previous) = previous_path {
            if previous != new_path {
                self.user_files.set_managed_by(previous, None).await?;
            }
        }
        Ok(())
    }

    /// (§4.5 `checkFile`).
    pub async fn check_file(
        &self,
        game: i64,
        user_id: &str,
        name: &str,
        directory: &str,
        managed_directory: Option<&str>,
    ) -> HostResult<FileDecision> {
        if managed_directory != Some(directory) {
            return Ok(FileDecision::Stale);
        }
        if let Some(slot_number) = parse_player_filename(name) {
            let slot = self.store.get_slot(game, slot_number).await?;
            if slot.chain.iter().any(|u| u == user_id) {
                return Ok(FileDecision::Turn(slot_number));
            }
        }
        if GAME_CONTROLLED_FILES.contains(&name) {
            return Ok(FileDecision::Refuse);
        }
        Ok(FileDecision::Allow)
    }

    fn caller_position(&self, session: &Session, slot: &Slot) -> HostResult<usize> {
        if session.is_admin() {
            return Ok(slot.chain.len() - 1);
        }
        slot.chain
            .iter()
            .position(|u| u == session.user())
            .ok_or_else(|| HostError::Forbidden("caller is not in this slot's chain".into()))
    }
}

/// `playerN.trn` → slot number N (§4.5 `checkFile` "turn" case).
fn parse_player_filename(name: &str) -> Option<u16> {
    let rest = name.strip_prefix("player")?;
    let digits = rest.strip_suffix(".trn")?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryFileService, NullScheduleNotifier};
    use host_store::MemoryStore;

    fn domain() -> (PlayerDomain, Arc<GameStoreView>) {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let files = Arc::new(MemoryFileService::new());
        (
            PlayerDomain::new(store.clone(), files, Arc::new(NullScheduleNotifier)),
            store,
        )
    }

    async fn seed_game(store: &GameStoreView, id: i64) {
        let game = host_store::Game {
            id,
            state: GameState::Joining,
            game_type: host_store::GameType::Public,
            ..Default::default()
        };
        store.put_game(&game).await.unwrap();
    }

    async fn seed_user(store: &GameStoreView, id: &str) {
        store
            .put_user(&User {
                id: id.to_string(),
                allow_join: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn join_then_resign_primary_empties_chain() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        seed_user(&store, "ua").await;
        let admin = Session::admin();
        domain.join(&admin, 1, 3, "ua").await.unwrap();
        let slot = store.get_slot(1, 3).await.unwrap();
        assert_eq!(slot.chain, vec!["ua".to_string()]);

        domain.resign(&admin, 1, 3, "ua").await.unwrap();
        let slot = store.get_slot(1, 3).await.unwrap();
        assert!(!slot.is_occupied());
    }

    #[tokio::test]
    async fn substitute_truncates_then_appends() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        for u in ["ua", "ub", "uc"] {
            seed_user(&store, u).await;
        }
        let admin = Session::admin();
        domain.join(&admin, 1, 1, "ua").await.unwrap();
        domain.substitute(&admin, 1, 1, "ub").await.unwrap();
        domain.substitute(&admin, 1, 1, "uc").await.unwrap();
        let slot = store.get_slot(1, 1).await.unwrap();
        assert_eq!(slot.chain, vec!["ua", "ub", "uc"]);
    }

    #[tokio::test]
    async fn resign_non_primary_removes_resigner_and_after() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        for u in ["ua", "ub", "uc"] {
            seed_user(&store, u).await;
        }
        let admin = Session::admin();
        domain.join(&admin, 1, 1, "ua").await.unwrap();
        domain.substitute(&admin, 1, 1, "ub").await.unwrap();
        domain.substitute(&admin, 1, 1, "uc").await.unwrap();

        domain.resign(&admin, 1, 1, "ub").await.unwrap();
        let slot = store.get_slot(1, 1).await.unwrap();
        assert_eq!(slot.chain, vec!["ua".to_string()]);
    }

    #[tokio::test]
    async fn resign_records_dropped_users_as_past_members() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        for u in ["ua", "ub"] {
            seed_user(&store, u).await;
        }
        let admin = Session::admin();
        domain.join(&admin, 1, 1, "ua").await.unwrap();
        domain.substitute(&admin, 1, 1, "ub").await.unwrap();
        domain.resign(&admin, 1, 1, "ub").await.unwrap();

        let game = store.get_game(1).await.unwrap().unwrap();
        assert_eq!(game.config.get("pastmember.ub"), Some(&"1".to_string()));

        let bits = host_auth::compute_bits(&game, &[store.get_slot(1, 1).await.unwrap()], "ub", false);
        assert!(bits.is_inactive);
    }

    #[tokio::test]
    async fn regular_user_may_only_join_themselves() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        seed_user(&store, "ua").await;
        seed_user(&store, "ub").await;
        let session = Session::as_user("ua");
        let err = domain.join(&session, 1, 1, "ub").await.unwrap_err();
        assert!(matches!(err, HostError::Forbidden(_)));
    }

    #[tokio::test]
    async fn check_file_classifies_turn_refuse_allow_stale() {
        let (domain, store) = domain();
        seed_game(&store, 1).await;
        seed_user(&store, "ua").await;
        domain.join(&Session::admin(), 1, 3, "ua").await.unwrap();

        let decision = domain
            .check_file(1, "ua", "player3.trn", "home/ua", Some("home/ua"))
            .await
            .unwrap();
        assert_eq!(decision, FileDecision::Turn(3));

        let decision = domain
            .check_file(1, "ua", "result.trn", "home/ua", Some("home/ua"))
            .await
            .unwrap();
        assert_eq!(decision, FileDecision::Refuse);

        let decision = domain
            .check_file(1, "ua", "notes.txt", "home/ua", Some("home/ua"))
            .await
            .unwrap();
        assert_eq!(decision, FileDecision::Allow);

        let decision = domain
            .check_file(1, "ua", "notes.txt", "home/ua", Some("other/dir"))
            .await
            .unwrap();
        assert_eq!(decision, FileDecision::Stale);
    }

    #[tokio::test]
    async fn managed_directory_conflict_is_rejected() {
        let files = MemoryFileService::new();
        files.seed_directory("home/ua/dir", "ua");
        let files = Arc::new(files);
        let domain = PlayerDomain::new(
            Arc::new(GameStoreView::new(Arc::new(MemoryStore::new()))),
            files,
            Arc::new(NullScheduleNotifier),
        );
        domain
            .set_managed_directory(1, "ua", "home/ua/dir", None)
            .await
            .unwrap();
        let err = domain
            .set_managed_directory(2, "ua", "home/ua/dir", None)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::DirectoryInUse(_)));
    }
}
