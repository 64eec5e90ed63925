//! Reconnect policy hook (§4.8 step 4, REDESIGN FLAGS "Per-connection
//! reconnection flags on downstream handlers"): a configuration struct the
//! dispatcher hands to every collaborator that cares about it, once per
//! request, before trying any family handler.
//!
//! Lives in `host-core` rather than `host-dispatch` (which re-exports it) so
//! that collaborator crates lower in the dependency graph — `host-store`'s
//! `RedisStore`, the one collaborator here with a real downstream connection
//! to reconnect — can implement `Reconnectable` without a dependency cycle
//! back onto the dispatcher.

/// Whether a collaborator should attempt to reconnect a dropped downstream
/// connection before serving its next call. Recovery mid-command is never
/// attempted (§7 "Recovery"); this only governs the *next* command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Implemented by collaborators that hold a persistent downstream connection
/// and need to know the current reconnect policy. Collaborators with no such
/// connection (e.g. the in-memory test doubles) simply don't implement it.
pub trait Reconnectable: Send + Sync {
    fn configure_reconnect(&self, policy: ReconnectPolicy);
}
