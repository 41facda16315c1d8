//! In-flight call coalescing
//!
//! Concurrent callers asking for the same key share one execution of the
//! supplied function. The record for a key lives only while that execution
//! runs; the next call after it finishes starts over.

use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};

enum Slot<T> {
    Pending,
    Done(T),
    Panicked,
}

/// One in-flight execution and the callers waiting on it
struct Call<T> {
    state: Mutex<CallState<T>>,
    done: Condvar,
}

struct CallState<T> {
    slot: Slot<T>,
    waiters: usize,
}

impl<T> Call<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CallState {
                slot: Slot::Pending,
                waiters: 0,
            }),
            done: Condvar::new(),
        }
    }
}

enum Role<T> {
    Leader(Arc<Call<T>>),
    Waiter(Arc<Call<T>>),
}

/// Collapses concurrent calls for the same key into one execution.
///
/// The map lock is only held to look up, insert or remove a record, never
/// while the function runs, so different keys proceed in parallel.
pub struct Coalescer<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>, RandomState>>,
}

impl<T: Clone> Coalescer<T> {
    /// Create a coalescer with no calls in flight
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Run `f` for `key` unless a call for `key` is already in flight, in
    /// which case block until it finishes and return its result.
    ///
    /// The flag is `true` when the result came from another caller's
    /// execution.
    ///
    /// # Panics
    ///
    /// If `f` panics, the panic resumes on the calling thread and every
    /// waiter panics as well. The in-flight record is cleared either way.
    pub fn run<F>(&self, key: &str, f: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        let role = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(call) => Role::Waiter(Arc::clone(call)),
                None => {
                    let call = Arc::new(Call::new());
                    calls.insert(key.to_owned(), Arc::clone(&call));
                    Role::Leader(call)
                }
            }
        };

        match role {
            Role::Waiter(call) => (Self::wait(key, &call), true),
            Role::Leader(call) => (self.lead(key, &call, f), false),
        }
    }

    /// Number of keys with an execution in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of callers blocked on the in-flight call for `key`
    pub fn waiting(&self, key: &str) -> usize {
        let call = match self.calls.lock().get(key) {
            Some(call) => Arc::clone(call),
            None => return 0,
        };
        let waiters = call.state.lock().waiters;
        waiters
    }

    fn lead<F>(&self, key: &str, call: &Call<T>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let outcome = catch_unwind(AssertUnwindSafe(f));

        // Unpublish before waking anyone: a caller that arrives once the
        // result exists must start a fresh execution, not join this one.
        self.calls.lock().remove(key);
        {
            let mut state = call.state.lock();
            state.slot = match &outcome {
                Ok(value) => Slot::Done(value.clone()),
                Err(_) => Slot::Panicked,
            };
        }
        call.done.notify_all();

        match outcome {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }

    fn wait(key: &str, call: &Call<T>) -> T {
        let mut state = call.state.lock();
        state.waiters += 1;
        while matches!(state.slot, Slot::Pending) {
            call.done.wait(&mut state);
        }
        state.waiters -= 1;

        match &state.slot {
            Slot::Done(value) => value.clone(),
            Slot::Panicked => panic!("in-flight call for key {:?} panicked", key),
            Slot::Pending => unreachable!("woke with call still pending"),
        }
    }
}

impl<T: Clone> Default for Coalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}
