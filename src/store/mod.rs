//! In-memory mirror of the tables, chains and rules held by the kernel.
//!
//! Each store guards its own map with its own lock: operations on one chain's rules never wait
//! for another chain, and only the `*_imm` methods and the busy retry loop of deletions perform
//! I/O while holding that lock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

mod chains;
mod rules;
mod tables;

pub use chains::ChainStore;
pub use rules::RuleStore;
pub use tables::TableStore;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// How long deletions keep retrying while the kernel reports the object as busy, and how long
/// they wait between two attempts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub deadline: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    /// A policy polling ten times over `deadline`.
    pub fn with_deadline(deadline: Duration) -> Self {
        RetryPolicy {
            deadline,
            interval: deadline / 10,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_deadline(DEFAULT_DEADLINE)
    }
}

/// Runs `op` until it succeeds, fails with anything else than a busy error, or the deadline
/// expires. In the latter case the last busy error is returned.
pub(crate) fn retry_busy<T, F>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Result<T, TransportError>,
{
    let start = Instant::now();
    let mut attempt = 1u32;
    loop {
        match op() {
            Err(e) if e.is_busy() => {
                if start.elapsed() + policy.interval >= policy.deadline {
                    warn!("{} still busy after {} attempts, giving up", what, attempt);
                    return Err(e);
                }
                warn!(
                    "{} is busy (attempt {}), retrying in {:?}",
                    what, attempt, policy.interval
                );
                thread::sleep(policy.interval);
                attempt += 1;
            }
            res => return res,
        }
    }
}

/// A panic while holding a store lock cannot leave the map half-updated: every operation either
/// inserts or removes a whole entry.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

static NEXT_SET_ID: AtomicU32 = AtomicU32::new(1);

/// Reserves `count` consecutive set identifiers and returns the first one. Identifiers only have
/// to be unique within a batch, but batches may be shared by every store of a transport.
pub(crate) fn reserve_set_ids(count: usize) -> u32 {
    NEXT_SET_ID.fetch_add(count as u32, Ordering::Relaxed)
}
