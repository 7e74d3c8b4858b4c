//! The process-wide in-use flag and its scope guard.
//!
//! The flag is only ever set by [`InUseGuard::try_acquire`] and only ever
//! cleared by dropping the guard, so every exit path of a generation clears
//! it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// In-use flag plus the cancellation handle of the active generation.
pub(crate) struct InUse {
    flag: watch::Sender<bool>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl InUse {
    pub(crate) fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag,
            cancel: Mutex::new(None),
        }
    }

    fn lock_cancel(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.flag.borrow()
    }

    /// Signal the active generation to stop. Returns `false` if none is
    /// running.
    pub(crate) fn cancel_active(&self) -> bool {
        match self.lock_cancel().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait until the flag clears. Returns `false` on timeout.
    pub(crate) async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut rx = self.flag.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|in_use| !*in_use)).await,
            Ok(Ok(_))
        )
    }
}

/// Exclusive right to run one generation.
pub(crate) struct InUseGuard<'a> {
    in_use: &'a InUse,
    token: CancellationToken,
}

impl<'a> InUseGuard<'a> {
    /// Set the flag if it is clear.
    pub(crate) fn try_acquire(in_use: &'a InUse) -> Option<Self> {
        let acquired = in_use.flag.send_if_modified(|set| {
            if *set {
                false
            } else {
                *set = true;
                true
            }
        });
        if !acquired {
            return None;
        }
        let token = CancellationToken::new();
        *in_use.lock_cancel() = Some(token.clone());
        Some(Self { in_use, token })
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InUseGuard<'_> {
    fn drop(&mut self) {
        *self.in_use.lock_cancel() = None;
        self.in_use.flag.send_replace(false);
    }
}
