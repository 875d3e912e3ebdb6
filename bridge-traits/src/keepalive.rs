//! Background Keep-Alive Abstraction
//!
//! Mobile hosts suspend the process shortly after it leaves the foreground
//! unless a background-task assertion is held. A token refresh that gets
//! suspended mid-flight can lose the response and strand the account with an
//! expired token, so the refresh path holds a keep-alive assertion for the
//! duration of the remote call.
//!
//! Hosts provide the assertion through [`KeepAlive`]; the core only ever
//! holds it through [`KeepAliveGuard`], which guarantees the `begin`/`end`
//! pair is balanced exactly once no matter which code path completes the
//! work. Platforms without a suspension concept (desktop) install
//! [`NoopKeepAlive`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque handle identifying one active keep-alive assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeepAliveId(pub u64);

impl std::fmt::Display for KeepAliveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform capability keeping the process alive while critical work runs.
///
/// `begin` and `end` are cheap registration calls (on iOS they map to
/// `beginBackgroundTask`/`endBackgroundTask`); they are deliberately
/// synchronous so an RAII guard can release the assertion from `Drop`.
///
/// Implementations must tolerate `end` being called with an id they no longer
/// track (the host may expire assertions on its own).
pub trait KeepAlive: Send + Sync {
    /// Begin a keep-alive assertion.
    ///
    /// # Arguments
    ///
    /// * `reason` - Short human-readable label for host-side diagnostics
    fn begin(&self, reason: &str) -> KeepAliveId;

    /// End a previously begun assertion.
    fn end(&self, id: KeepAliveId);
}

/// RAII wrapper pairing `begin` with exactly one `end`.
///
/// The assertion is released when the guard is dropped, which covers every
/// exit from the guarded scope: success, error return, and future
/// cancellation.
pub struct KeepAliveGuard {
    provider: Arc<dyn KeepAlive>,
    id: Option<KeepAliveId>,
}

impl KeepAliveGuard {
    /// Begin an assertion on `provider` and hold it until drop.
    pub fn begin(provider: Arc<dyn KeepAlive>, reason: &str) -> Self {
        let id = provider.begin(reason);
        Self {
            provider,
            id: Some(id),
        }
    }

    /// The id of the held assertion.
    pub fn id(&self) -> Option<KeepAliveId> {
        self.id
    }
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.provider.end(id);
        }
    }
}

impl std::fmt::Debug for KeepAliveGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveGuard").field("id", &self.id).finish()
    }
}

/// Keep-alive for platforms where the process is never suspended.
///
/// Ids are still handed out sequentially so tests can assert pairing.
#[derive(Debug, Default)]
pub struct NoopKeepAlive {
    next_id: AtomicU64,
}

impl NoopKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeepAlive for NoopKeepAlive {
    fn begin(&self, _reason: &str) -> KeepAliveId {
        KeepAliveId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn end(&self, _id: KeepAliveId) {}
}
