//! The game arbiter (§4.1): per-game reader/writer serialization with two
//! admission modes. `simple` holders coexist with one another; `host` is
//! exclusive against everything. Requests are admitted in arrival order so
//! neither mode can starve the other — a waiting `host` request blocks any
//! `simple` request that arrived after it, the way a standard fair
//! read-write lock does, rather than letting a stream of `simple` callers
//! perpetually skip the queue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Simple,
    Host,
}

struct Waiter {
    mode: Mode,
    notify: Arc<Notify>,
    granted: Arc<AtomicBool>,
}

#[derive(Default)]
struct LockState {
    simple_holders: u32,
    host_held: bool,
    queue: VecDeque<Waiter>,
}

impl LockState {
    fn can_grant_immediately(&self, mode: Mode) -> bool {
        self.queue.is_empty()
            && match mode {
                Mode::Simple => !self.host_held,
                Mode::Host => !self.host_held && self.simple_holders == 0,
            }
    }

    /// Grants everything at the front of the queue that current admission
    /// rules allow, stopping at the first entry that cannot yet proceed.
    fn drain_queue(&mut self) {
        loop {
            let Some(front) = self.queue.front() else {
                return;
            };
            match front.mode {
                Mode::Host => {
                    if self.host_held || self.simple_holders > 0 {
                        return;
                    }
                    let waiter = self.queue.pop_front().unwrap();
                    self.host_held = true;
                    waiter.granted.store(true, Ordering::SeqCst);
                    waiter.notify.notify_one();
                    return; // host is exclusive; nothing further can admit
                }
                Mode::Simple => {
                    if self.host_held {
                        return;
                    }
                    let waiter = self.queue.pop_front().unwrap();
                    self.simple_holders += 1;
                    waiter.granted.store(true, Ordering::SeqCst);
                    waiter.notify.notify_one();
                    // keep looping: more queued simple requests may also admit
                }
            }
        }
    }
}

struct GameLock {
    state: Mutex<LockState>,
}

/// A held admission. Dropping it releases the lock and wakes the next
/// eligible waiter (§4.1 "handle release never fails").
pub struct Handle {
    lock: Arc<GameLock>,
    mode: Mode,
    released: bool,
}

impl Handle {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let lock = self.lock.clone();
        let mode = self.mode;
        // Dropped from sync context; spawn the async release so Drop stays sync.
        tokio::spawn(async move {
            let mut state = lock.state.lock().await;
            match mode {
                Mode::Host => state.host_held = false,
                Mode::Simple => state.simple_holders = state.simple_holders.saturating_sub(1),
            }
            state.drain_queue();
        });
    }
}

/// Per-game arbiter registry (§2 "Game arbiter"), keyed by game id.
#[derive(Default)]
pub struct Arbiter {
    games: Mutex<HashMap<i64, Arc<GameLock>>>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, game: i64) -> Arc<GameLock> {
        let mut games = self.games.lock().await;
        games
            .entry(game)
            .or_insert_with(|| {
                Arc::new(GameLock {
                    state: Mutex::new(LockState::default()),
                })
            })
            .clone()
    }

    /// Blocks until admission is possible in the requested `mode`.
    pub async fn acquire(&self, game: i64, mode: Mode) -> Handle {
        let lock = self.lock_for(game).await;
        let notify = Arc::new(Notify::new());
        let granted = Arc::new(AtomicBool::new(false));
        {
            let mut state = lock.state.lock().await;
            if state.can_grant_immediately(mode) {
                match mode {
                    Mode::Host => state.host_held = true,
                    Mode::Simple => state.simple_holders += 1,
                }
                log::debug!("[arbiter] game {game} granted {mode:?} immediately");
                return Handle {
                    lock,
                    mode,
                    released: false,
                };
            }
            state.queue.push_back(Waiter {
                mode,
                notify: notify.clone(),
                granted: granted.clone(),
            });
        }
        loop {
            notify.notified().await;
            if granted.load(Ordering::SeqCst) {
                log::debug!("[arbiter] game {game} granted {mode:?} from queue");
                return Handle {
                    lock,
                    mode,
                    released: false,
                };
            }
        }
    }

    /// Reports whether `game` is currently held in `host` mode (§8 universal property).
    pub async fn is_host_held(&self, game: i64) -> bool {
        let lock = self.lock_for(game).await;
        lock.state.lock().await.host_held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn simple_holders_coexist() {
        let arbiter = Arbiter::new();
        let a = arbiter.acquire(1, Mode::Simple).await;
        let b = arbiter.acquire(1, Mode::Simple).await;
        assert_eq!(a.mode(), Mode::Simple);
        assert_eq!(b.mode(), Mode::Simple);
    }

    #[tokio::test]
    async fn host_excludes_simple_until_released() {
        let arbiter = Arc::new(Arbiter::new());
        let host = arbiter.acquire(7, Mode::Host).await;
        assert!(arbiter.is_host_held(7).await);

        let arbiter2 = arbiter.clone();
        let waiter = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let _simple = arbiter2.acquire(7, Mode::Simple).await;
            started.elapsed()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(host);
        let waited = waiter.await.unwrap();
        assert!(waited >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn queued_host_blocks_later_simple_arrivals() {
        let arbiter = Arc::new(Arbiter::new());
        let first_simple = arbiter.acquire(3, Mode::Simple).await;

        let arbiter2 = arbiter.clone();
        let host_waiting = tokio::spawn(async move { arbiter2.acquire(3, Mode::Host).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let arbiter3 = arbiter.clone();
        let late_simple_granted = Arc::new(AtomicBool::new(false));
        let flag = late_simple_granted.clone();
        let late_simple = tokio::spawn(async move {
            let handle = arbiter3.acquire(3, Mode::Simple).await;
            flag.store(true, Ordering::SeqCst);
            handle
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!late_simple_granted.load(Ordering::SeqCst));

        drop(first_simple);
        let host_handle = host_waiting.await.unwrap();
        assert_eq!(host_handle.mode(), Mode::Host);
        drop(host_handle);
        let _ = late_simple.await.unwrap();
    }
}
