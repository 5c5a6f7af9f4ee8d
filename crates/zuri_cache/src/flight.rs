//! Per-fingerprint single-flight slots.
//!
//! The first caller for a fingerprint becomes the leader and runs the build.
//! Later callers find the slot, block on its condition variable and clone
//! the leader's result. A leader that gives up (cancellation or panic)
//! marks its slot abandoned; the waiters then race again and one of them
//! leads the next attempt.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use zuri_common::{CancellationToken, Fingerprint, InternalError};

use crate::error::CacheError;

/// How often a waiter wakes up to check its cancellation token.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Whether a caller ran the build or received another caller's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This caller ran the build.
    Leader,
    /// This caller waited for the leader.
    Waiter,
}

/// The result of [`ArtifactCache::get_or_build`](crate::ArtifactCache::get_or_build).
#[derive(Debug, Clone)]
pub struct Flight<T> {
    /// The value produced by the leader.
    pub value: T,
    /// How this caller obtained it.
    pub role: Role,
}

enum SlotState {
    Running,
    Done(Arc<dyn Any + Send + Sync>),
    Abandoned,
}

pub(crate) struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fingerprints in flight and their slots.
pub(crate) type SlotMap = HashMap<Fingerprint, Arc<Slot>>;

#[derive(Default)]
pub(crate) struct Flights {
    slots: Mutex<SlotMap>,
}

enum Joined {
    Leader(Arc<Slot>),
    Waiter(Arc<Slot>),
}

impl Flights {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotMap> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_in_flight(&self, fp: &Fingerprint) -> bool {
        self.lock().contains_key(fp)
    }

    fn join(&self, fp: Fingerprint) -> Joined {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(&fp) {
            return Joined::Waiter(slot.clone());
        }
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState::Running),
            ready: Condvar::new(),
        });
        slots.insert(fp, slot.clone());
        Joined::Leader(slot)
    }

    /// Runs `build` once per fingerprint across concurrent callers.
    ///
    /// `build` returns `None` when it gave up; the leader then reports
    /// [`CacheError::Cancelled`] and its waiters try again.
    pub(crate) fn run<T, F>(
        &self,
        fp: Fingerprint,
        cancel: &CancellationToken,
        timeout: Duration,
        build: F,
    ) -> Result<Flight<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Option<T>,
    {
        let start = Instant::now();
        let mut build = Some(build);
        loop {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            match self.join(fp) {
                Joined::Leader(slot) => {
                    let mut guard = LeaderGuard {
                        flights: self,
                        fp,
                        slot,
                        settled: false,
                    };
                    let Some(build) = build.take() else {
                        return Err(InternalError::new("single-flight build ran twice").into());
                    };
                    tracing::debug!(fingerprint = %fp.short(), "leading build");
                    return match build() {
                        Some(value) => {
                            guard.settle(SlotState::Done(Arc::new(value.clone())));
                            Ok(Flight {
                                value,
                                role: Role::Leader,
                            })
                        }
                        None => {
                            guard.settle(SlotState::Abandoned);
                            Err(CacheError::Cancelled)
                        }
                    };
                }
                Joined::Waiter(slot) => {
                    tracing::debug!(fingerprint = %fp.short(), "waiting for in-flight build");
                    match wait(&slot, cancel, start, timeout)? {
                        Some(shared) => {
                            let value = shared.downcast_ref::<T>().cloned().ok_or_else(|| {
                                InternalError::new(format!(
                                    "build for {fp} produced a value of another type"
                                ))
                            })?;
                            return Ok(Flight {
                                value,
                                role: Role::Waiter,
                            });
                        }
                        None => {
                            tracing::debug!(fingerprint = %fp.short(), "leader abandoned build, retrying");
                        }
                    }
                }
            }
        }
    }
}

/// Blocks until the slot settles. `None` means the leader abandoned it.
fn wait(
    slot: &Slot,
    cancel: &CancellationToken,
    start: Instant,
    timeout: Duration,
) -> Result<Option<Arc<dyn Any + Send + Sync>>, CacheError> {
    let mut state = slot.lock();
    loop {
        match &*state {
            SlotState::Done(value) => return Ok(Some(value.clone())),
            SlotState::Abandoned => return Ok(None),
            SlotState::Running => {}
        }
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(CacheError::Timeout {
                operation: "wait for in-flight build".to_string(),
                waited,
            });
        }
        let step = (timeout - waited).min(WAIT_POLL);
        state = match slot.ready.wait_timeout(state, step) {
            Ok((state, _)) => state,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
}

/// Settles the leader's slot, including when the build panics.
struct LeaderGuard<'a> {
    flights: &'a Flights,
    fp: Fingerprint,
    slot: Arc<Slot>,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: SlotState) {
        if self.settled {
            return;
        }
        self.settled = true;
        *self.slot.lock() = outcome;
        self.slot.ready.notify_all();
        let mut slots = self.flights.lock();
        if slots
            .get(&self.fp)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            slots.remove(&self.fp);
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.settle(SlotState::Abandoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn fp() -> Fingerprint {
        Fingerprint::from_raw([3; 16])
    }

    #[test]
    fn leader_runs_build() {
        let flights = Flights::default();
        let flight = flights
            .run(fp(), &CancellationToken::new(), Duration::from_secs(1), || Some(5))
            .unwrap();
        assert_eq!(flight.value, 5);
        assert_eq!(flight.role, Role::Leader);
        assert!(!flights.is_in_flight(&fp()));
    }

    #[test]
    fn concurrent_callers_share_one_build() {
        let flights = Flights::default();
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(4);
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        flights
                            .run(fp(), &CancellationToken::new(), Duration::from_secs(5), || {
                                runs.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(100));
                                Some("ir".to_string())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|f| f.value == "ir"));
        assert_eq!(
            results.iter().filter(|f| f.role == Role::Leader).count(),
            1
        );
    }

    #[test]
    fn cancelled_caller_never_acquires_slot() {
        let flights = Flights::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = flights
            .run(fp(), &cancel, Duration::from_secs(1), || -> Option<u8> {
                panic!("must not run")
            })
            .unwrap_err();
        assert_eq!(err, CacheError::Cancelled);
        assert!(!flights.is_in_flight(&fp()));
    }

    #[test]
    fn waiter_times_out() {
        let flights = Flights::default();
        let started = Barrier::new(2);
        let release = Barrier::new(2);
        std::thread::scope(|s| {
            s.spawn(|| {
                flights
                    .run(fp(), &CancellationToken::new(), Duration::from_secs(5), || {
                        started.wait();
                        release.wait();
                        Some(1u32)
                    })
                    .unwrap();
            });
            started.wait();
            let err = flights
                .run(fp(), &CancellationToken::new(), Duration::from_millis(50), || Some(2u32))
                .unwrap_err();
            assert!(matches!(err, CacheError::Timeout { .. }));
            release.wait();
        });
    }

    #[test]
    fn waiters_take_over_from_abandoned_leader() {
        let flights = Flights::default();
        let started = Barrier::new(2);
        std::thread::scope(|s| {
            let leader = s.spawn(|| {
                flights.run(fp(), &CancellationToken::new(), Duration::from_secs(5), || {
                    started.wait();
                    std::thread::sleep(Duration::from_millis(50));
                    None::<u32>
                })
            });
            started.wait();
            let flight = flights
                .run(fp(), &CancellationToken::new(), Duration::from_secs(5), || Some(9u32))
                .unwrap();
            assert_eq!(flight.value, 9);
            assert_eq!(flight.role, Role::Leader);
            assert_eq!(leader.join().unwrap().unwrap_err(), CacheError::Cancelled);
        });
    }

    #[test]
    fn panicking_leader_releases_slot() {
        let flights = Flights::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            flights.run(fp(), &CancellationToken::new(), Duration::from_secs(1), || -> Option<u8> {
                panic!("boom")
            })
        }));
        assert!(result.is_err());
        assert!(!flights.is_in_flight(&fp()));
    }
}
