//! Turn submission and state-transition pipeline (§4.6): identify the
//! target game/slot from the blob's declared fields (or explicit overrides),
//! invoke the external checker, classify the result, and update state.

use crate::collaborators::{FileService, ScheduleNotifier};
use host_auth::Session;
use host_core::{HostError, HostResult};
use host_store::{GameStoreView, TurnState};
use host_subprocess::{Command, ProcessRunner};
use std::sync::Arc;

/// Byte layout of a turn file header (§4.6 step 2-3): a 16-bit little-endian
/// declared slot number at offset 0, followed immediately by an 18-byte
/// timestamp field. The source's wire format carries further
/// engine-specific payload and trailer after this, which this service never
/// interprets — only the external checker does.
const SLOT_OFFSET: usize = 0;
const TIMESTAMP_OFFSET: usize = 2;
const TIMESTAMP_LEN: usize = 18;
const MIN_BLOB_LEN: usize = TIMESTAMP_OFFSET + TIMESTAMP_LEN + 4; // header + minimal trailer

pub struct TurnDomain {
    store: Arc<GameStoreView>,
    host_files: Arc<dyn FileService>,
    checker: Arc<ProcessRunner>,
    checker_program: String,
    notifier: Arc<dyn ScheduleNotifier>,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub blob: Vec<u8>,
    pub game: Option<i64>,
    pub slot: Option<u16>,
    pub mail: Option<String>,
    pub info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub status: u8,
    pub output: String,
    pub game: i64,
    pub slot: u16,
    pub previous: u8,
    pub user: String,
}

impl TurnDomain {
    pub fn new(
        store: Arc<GameStoreView>,
        host_files: Arc<dyn FileService>,
        checker: Arc<ProcessRunner>,
        checker_program: impl Into<String>,
        notifier: Arc<dyn ScheduleNotifier>,
    ) -> Self {
        Self {
            store,
            host_files,
            checker,
            checker_program: checker_program.into(),
            notifier,
        }
    }

    /// (§4.6 "Submit"). `session` identifies the caller for the
    /// admin/mail/user resolution rules in step 6.
    pub async fn submit(&self, session: &Session, req: SubmitRequest) -> HostResult<SubmitResult> {
        if req.blob.is_empty() {
            return Err(HostError::BadRequest("empty turn blob".into()));
        }
        if req.blob.len() < MIN_BLOB_LEN {
            return Err(HostError::BadRequest("turn blob too short".into()));
        }

        let declared_slot = u16::from_le_bytes([req.blob[SLOT_OFFSET], req.blob[SLOT_OFFSET + 1]]);
        let timestamp_bytes = &req.blob[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_LEN];
        let timestamp = String::from_utf8_lossy(timestamp_bytes).trim_end_matches('\0').to_string();

        if let Some(explicit_slot) = req.slot {
            if explicit_slot != declared_slot {
                return Err(HostError::BadRequest(format!(
                    "declared slot {declared_slot} does not match requested slot {explicit_slot}"
                )));
            }
        }

        let game_id = match req.game {
            Some(id) => id,
            None => self
                .store
                .find_game_by_timestamp(&timestamp)
                .await?
                .ok_or_else(|| HostError::NotFound(format!("no game matches timestamp {timestamp:?}")))?,
        };
        let game = self
            .store
            .get_game(game_id)
            .await?
            .ok_or_else(|| HostError::NotFound(format!("game {game_id}")))?;

        let mut slot = self.store.get_slot(game_id, declared_slot).await?;

        let user = self.identify_submitter(session, &slot, req.mail.as_deref()).await?;

        let path = format!("{}/in/player{}.trn", game.directory, declared_slot);
        self.host_files.write(&path, &req.blob).await?;

        let output = self
            .checker
            .run(&Command::new(self.checker_program.clone()).arg(path.clone()))
            .await?;
        let new_state = TurnState::from_checker_exit(output.exit_code);
        let previous = slot.state;

        if new_state.is_ready() {
            // green/yellow: this becomes the slot's canonical turn file.
            let canonical = format!("{}/player{}.trn", game.directory, declared_slot);
            self.host_files.write(&canonical, &req.blob).await?;
        }
        // red/bad/stale/needless: any previously-stored canonical file is
        // left untouched; only the recorded state transitions.
        slot.state = new_state;
        self.store.put_slot(game_id, &slot).await?;

        if !user.is_empty() {
            if let Some(mut submitter) = self.store.get_user(&user).await? {
                submitter.record_submission(new_state.is_ready());
                self.store.put_user(&submitter).await?;
            }
        }

        if previous != new_state {
            self.notifier.handle_game_change(game_id).await;
        }

        Ok(SubmitResult {
            status: new_state.0,
            output: output.stdout,
            game: game_id,
            slot: declared_slot,
            previous: previous.0,
            user,
        })
    }

    async fn identify_submitter(&self, session: &Session, slot: &host_store::Slot, mail: Option<&str>) -> HostResult<String> {
        if session.is_admin() {
            let Some(mail) = mail else {
                return Ok(String::new());
            };
            let lowered = mail.to_ascii_lowercase();
            for user_id in &slot.chain {
                if let Some(user) = self.store.get_user(user_id).await? {
                    if user.email.as_deref().map(str::to_ascii_lowercase).as_deref() == Some(lowered.as_str()) {
                        return Ok(user.id);
                    }
                }
            }
            return Err(HostError::MailMismatch(format!("no player matches mail {mail}")));
        }

        if !slot.chain.iter().any(|u| u == session.user()) {
            return Err(HostError::Forbidden(format!(
                "{} is not on this slot's chain",
                session.user()
            )));
        }
        Ok(session.user().to_string())
    }

    /// (§4.6 `setTemporary`). Caller must be admin or the slot's primary.
    pub async fn set_temporary(&self, session: &Session, game: i64, slot_number: u16, flag: bool) -> HostResult<()> {
        let mut slot = self.store.get_slot(game, slot_number).await?;
        if slot.state == TurnState::MISSING {
            return Err(HostError::WrongState(format!("slot {slot_number} has no submitted turn")));
        }
        let is_primary = slot.primary() == Some(session.user());
        if !session.is_admin() && !is_primary {
            return Err(HostError::Forbidden("only admin or the slot's primary may mark temporary".into()));
        }
        slot.state = slot.state.with_temporary(flag);
        self.store.put_slot(game, &slot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryFileService, NullScheduleNotifier};
    use host_store::{Game, MemoryStore, Slot, User};

    fn blob(timestamp: &str, slot: u16, total_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; total_len];
        buf[0..2].copy_from_slice(&slot.to_le_bytes());
        let ts_bytes = timestamp.as_bytes();
        buf[2..2 + ts_bytes.len()].copy_from_slice(ts_bytes);
        buf
    }

    async fn setup() -> (TurnDomain, Arc<GameStoreView>) {
        let store = Arc::new(GameStoreView::new(Arc::new(MemoryStore::new())));
        let game = Game {
            id: 1,
            directory: "games/0001".to_string(),
            timestamp: "22-11-199911:22:33".to_string(),
            ..Default::default()
        };
        store.put_game(&game).await.unwrap();
        store
            .put_slot(
                1,
                &Slot {
                    number: 3,
                    chain: vec!["ua".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .put_user(&User {
                id: "ua".to_string(),
                email: Some("ua@examp.le".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let domain = TurnDomain::new(
            store.clone(),
            Arc::new(MemoryFileService::new()),
            Arc::new(ProcessRunner::new()),
            "true", // POSIX `true`: always exits 0 (green), used as the checker stub
            Arc::new(NullScheduleNotifier),
        );
        (domain, store)
    }

    #[tokio::test]
    async fn green_submission_by_slot_timestamp() {
        let (domain, _store) = setup().await;
        let blob = blob("22-11-199911:22:33", 3, 280);
        let req = SubmitRequest {
            blob,
            game: None,
            slot: None,
            mail: None,
            info: None,
        };
        let result = domain.submit(&Session::as_user("ua"), req).await.unwrap();
        assert_eq!(result.status, host_core::TURN_GREEN);
        assert_eq!(result.game, 1);
        assert_eq!(result.slot, 3);
        assert_eq!(result.previous, host_core::TURN_MISSING);
        assert_eq!(result.user, "ua");
    }

    #[tokio::test]
    async fn submission_by_mail_is_case_insensitive() {
        let (domain, _store) = setup().await;
        let blob = blob("22-11-199911:22:33", 3, 280);
        let req = SubmitRequest {
            blob,
            game: None,
            slot: None,
            mail: Some("UA@Examp.LE".to_string()),
            info: None,
        };
        let result = domain.submit(&Session::admin(), req).await.unwrap();
        assert_eq!(result.user, "ua");
    }

    #[tokio::test]
    async fn mismatched_explicit_slot_is_rejected_before_mutation() {
        let (domain, store) = setup().await;
        let blob = blob("22-11-199911:22:33", 3, 280);
        let req = SubmitRequest {
            blob,
            game: Some(1),
            slot: Some(9),
            mail: None,
            info: None,
        };
        let err = domain.submit(&Session::admin(), req).await.unwrap_err();
        assert!(matches!(err, HostError::BadRequest(_)));
        let slot = store.get_slot(1, 3).await.unwrap();
        assert_eq!(slot.state, TurnState::MISSING, "no mutation should have occurred");
    }

    #[tokio::test]
    async fn non_member_user_cannot_submit() {
        let (domain, _store) = setup().await;
        let blob = blob("22-11-199911:22:33", 3, 280);
        let req = SubmitRequest {
            blob,
            game: Some(1),
            slot: None,
            mail: None,
            info: None,
        };
        let err = domain.submit(&Session::as_user("stranger"), req).await.unwrap_err();
        assert!(matches!(err, HostError::Forbidden(_)));
    }

    #[tokio::test]
    async fn green_submission_updates_submitter_reliability() {
        let (domain, store) = setup().await;
        let blob = blob("22-11-199911:22:33", 3, 280);
        let req = SubmitRequest {
            blob,
            game: None,
            slot: None,
            mail: None,
            info: None,
        };
        domain.submit(&Session::as_user("ua"), req).await.unwrap();
        let user = store.get_user("ua").await.unwrap().unwrap();
        assert_eq!(user.turns_played, 1);
        assert_eq!(user.turns_missed, 0);
        assert_eq!(user.reliability, 1.0);
    }

    #[tokio::test]
    async fn set_temporary_requires_submitted_turn() {
        let (domain, _store) = setup().await;
        let err = domain
            .set_temporary(&Session::admin(), 1, 3, true)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::WrongState(_)));
    }
}
