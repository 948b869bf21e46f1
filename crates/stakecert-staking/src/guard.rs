use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use stakecert_core::error::StakeError;

/// Held for the duration of every state-changing entry point.
///
/// Calls from different threads are serialized: a second thread blocks until
/// the first one leaves. A call made from the thread that already holds the
/// guard (a collaborator calling back into the ledger) is turned away with
/// `Reentrant` instead of deadlocking.
#[derive(Default)]
pub struct ReentrancyGuard {
    serial: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
}

/// Releases the guard when dropped, including on early `?` returns.
pub struct Entered<'a> {
    holder: &'a Mutex<Option<ThreadId>>,
    _serial: MutexGuard<'a, ()>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<Entered<'_>, StakeError> {
        let me = thread::current().id();
        if *self.holder.lock() == Some(me) {
            return Err(StakeError::Reentrant);
        }
        let serial = self.serial.lock();
        *self.holder.lock() = Some(me);
        Ok(Entered { holder: &self.holder, _serial: serial })
    }

    pub fn is_entered(&self) -> bool {
        self.holder.lock().is_some()
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        // Runs before `_serial` is released.
        *self.holder.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn nested_enter_rejected_until_released() {
        let guard = ReentrancyGuard::new();
        {
            let _outer = guard.enter().unwrap();
            assert!(guard.is_entered());
            assert!(matches!(guard.enter(), Err(StakeError::Reentrant)));
        }
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn other_threads_wait_instead_of_failing() {
        let guard = ReentrancyGuard::new();
        let inside = AtomicUsize::new(0);
        let entered = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let _token = guard.enter().expect("concurrent caller must not see Reentrant");
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "two callers inside at once");
                        entered.fetch_add(1, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(entered.load(Ordering::SeqCst), 400);
        assert!(!guard.is_entered());
    }
}
