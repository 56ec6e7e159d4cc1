//! Single-flight coordination of token renewals.
//!
//! The first caller to ask for a renewal becomes the renewer: it builds the
//! renewal future, wraps it in [`Shared`] and parks it in a slot. Everyone who
//! arrives while the slot is occupied clones that same future and awaits it,
//! so they are all woken by the renewer's completion and observe its result.
//! An occupied slot is the "renewal in progress" flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::error::RenewalError;
use crate::utils::log_throttle::LogThrottle;

pub type RenewalResult = Result<(), RenewalError>;

type InFlight = Shared<BoxFuture<'static, RenewalResult>>;

const JOIN_LOG_WINDOW: Duration = Duration::from_secs(30);

/// Whether a caller performed the renewal or waited on someone else's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalRole {
    Renewer,
    Waiter,
}

pub struct RenewalCoordinator {
    slot: Mutex<Option<(u64, InFlight)>>,
    next_id: AtomicU64,
    join_log: LogThrottle,
}

impl RenewalCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
            join_log: LogThrottle::new(JOIN_LOG_WINDOW),
        }
    }

    /// True exactly while a renewal is outstanding.
    pub fn is_renewing(&self) -> bool {
        self.lock().is_some()
    }

    /// Run `start` unless a renewal is already in flight, in which case wait
    /// for that one instead. `start` is only invoked by the renewer.
    ///
    /// Every caller clears the slot (if it still holds this renewal) before
    /// returning, so nobody resumes while the flag is still set. If the
    /// renewer is dropped mid-flight the next caller keeps driving the same
    /// future.
    pub async fn run<F>(&self, start: F) -> (RenewalRole, RenewalResult)
    where
        F: FnOnce() -> BoxFuture<'static, RenewalResult>,
    {
        let (id, role, in_flight) = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some((id, in_flight)) => (*id, RenewalRole::Waiter, in_flight.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let in_flight = start().shared();
                    *slot = Some((id, in_flight.clone()));
                    (id, RenewalRole::Renewer, in_flight)
                }
            }
        };

        if role == RenewalRole::Waiter {
            if let Some(suppressed_count) = self.join_log.should_emit() {
                debug!(
                    event_name = "auth.renewal.join",
                    event_domain = "auth",
                    renewal_id = id,
                    suppressed_count,
                    "waiting on in-flight token renewal"
                );
            }
        }

        let result = in_flight.await;
        self.finish(id);
        (role, result)
    }

    fn finish(&self, id: u64) {
        let mut slot = self.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, InFlight)>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RenewalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
