// Single-flight lazy initialization.
// Concurrent callers that hit an uninitialized cell park on a condvar while
// exactly one of them runs the initializer.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Observable state of a [`SingleFlight`] cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum State<T> {
    Uninitialized,
    Initializing,
    Ready(Arc<T>),
    Failed(Error),
}

/// A lazily built value with states `Uninitialized -> Initializing -> Ready | Failed`.
///
/// `Failed` is terminal: later callers receive the recorded error instead of
/// a second attempt. An initializer that panics puts the cell back to
/// `Uninitialized` and wakes the waiters.
pub struct SingleFlight<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            ready: Condvar::new(),
        }
    }

    /// A cell that is already `Ready`
    pub fn ready(value: T) -> Self {
        Self {
            state: Mutex::new(State::Ready(Arc::new(value))),
            ready: Condvar::new(),
        }
    }

    pub fn status(&self) -> InitStatus {
        match &*self.state.lock() {
            State::Uninitialized => InitStatus::Uninitialized,
            State::Initializing => InitStatus::Initializing,
            State::Ready(_) => InitStatus::Ready,
            State::Failed(_) => InitStatus::Failed,
        }
    }

    /// The value if the cell is `Ready`
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.state.lock() {
            State::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Return the value, running `init` if no caller has done so yet
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Ready(value) => return Ok(value.clone()),
                State::Failed(err) => return Err(err.clone()),
                State::Uninitialized => break,
                State::Initializing => {}
            }
            self.ready.wait(&mut state);
        }
        *state = State::Initializing;
        drop(state);

        let guard = ResetOnUnwind { cell: self };
        let outcome = init();
        std::mem::forget(guard);

        let mut state = self.state.lock();
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *state = State::Ready(value.clone());
                Ok(value)
            }
            Err(err) => {
                *state = State::Failed(err.clone());
                Err(err)
            }
        };
        drop(state);
        self.ready.notify_all();
        result
    }
}

struct ResetOnUnwind<'a, T> {
    cell: &'a SingleFlight<T>,
}

impl<T> Drop for ResetOnUnwind<'_, T> {
    fn drop(&mut self) {
        *self.cell.state.lock() = State::Uninitialized;
        self.cell.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_runs_once_under_contention() {
        let cell = Arc::new(SingleFlight::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    *cell
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.status(), InitStatus::Ready);
    }

    #[test]
    fn test_failure_is_terminal() {
        let cell = SingleFlight::<usize>::new();
        let err = cell
            .get_or_try_init(|| Err(DataError::EmptySource { system: "x".into() }.into()))
            .unwrap_err();
        assert_eq!(cell.status(), InitStatus::Failed);

        let again = cell.get_or_try_init(|| Ok(1)).unwrap_err();
        assert_eq!(err, again);
    }

    #[test]
    fn test_panic_resets_cell() {
        let cell = Arc::new(SingleFlight::<usize>::new());
        let panicking = cell.clone();
        let result = thread::spawn(move || {
            let _ = panicking.get_or_try_init(|| panic!("boom"));
        })
        .join();
        assert!(result.is_err());
        assert_eq!(cell.status(), InitStatus::Uninitialized);
        assert_eq!(*cell.get_or_try_init(|| Ok(7)).unwrap(), 7);
    }
}
