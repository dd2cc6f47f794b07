//! Per-object advisory lock with wait/notify
//!
//! Design: an owner slot guarded by a `parking_lot` mutex plus two condition
//! variables on that same mutex: `available` wakes threads waiting to take
//! the lock, `notification` wakes threads parked in `wait`. The owner is
//! tracked explicitly so that recursive locking and waiting without the lock
//! can be trapped instead of deadlocking.

use crate::logging::log_lock_contention;
use crate::{trap, trap_if};
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

pub struct Locking {
    owner: Mutex<Option<ThreadId>>,
    available: Condvar,
    notification: Condvar,
}

impl Default for Locking {
    fn default() -> Self {
        Self::new()
    }
}

impl Locking {
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            available: Condvar::new(),
            notification: Condvar::new(),
        }
    }

    /// Block until the lock is taken by the calling thread
    ///
    /// Traps if the calling thread already holds it.
    pub fn lock(&self, name: &str, address: *const u8) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        trap_if!(
            *owner == Some(me),
            InvalidState,
            "recursive lock of {}@{:p} by {:?}",
            name,
            address,
            me
        );

        if owner.is_some() {
            log_lock_contention(name, address);
        }
        while owner.is_some() {
            self.available.wait(&mut owner);
        }
        *owner = Some(me);
        true
    }

    /// Take the lock if it is free
    pub fn try_lock(&self, name: &str, address: *const u8) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        match *owner {
            None => {
                *owner = Some(me);
                true
            }
            Some(holder) if holder == me => {
                trap!(InvalidState, "recursive try_lock of {}@{:p} by {:?}", name, address, me)
            }
            Some(_) => false,
        }
    }

    /// Release the lock; false if the calling thread does not hold it
    pub fn unlock(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner != Some(me) {
            return false;
        }
        *owner = None;
        drop(owner);
        self.available.notify_one();
        true
    }

    pub fn is_locked(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Release the lock, park until notified or `deadline`, retake the lock
    ///
    /// Returns true if woken by a notification.
    fn park(&self, name: &str, address: *const u8, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        trap_if!(
            *owner != Some(me),
            InvalidState,
            "wait on {}@{:p} without holding its lock",
            name,
            address
        );

        *owner = None;
        self.available.notify_one();

        let notified = match deadline {
            Some(deadline) => !self.notification.wait_until(&mut owner, deadline).timed_out(),
            None => {
                self.notification.wait(&mut owner);
                true
            }
        };

        while owner.is_some() {
            self.available.wait(&mut owner);
        }
        *owner = Some(me);
        notified
    }

    pub fn wait(&self, name: &str, address: *const u8) {
        self.park(name, address, None);
    }

    /// A timeout too large to express as an `Instant` waits without one
    pub fn wait_for(&self, name: &str, address: *const u8, timeout: Duration) -> bool {
        self.park(name, address, Instant::now().checked_add(timeout))
    }

    pub fn wait_until(&self, name: &str, address: *const u8, deadline: Instant) -> bool {
        self.park(name, address, Some(deadline))
    }

    pub fn notify(&self) {
        self.notification.notify_one();
    }

    pub fn notify_all(&self) {
        self.notification.notify_all();
    }
}
