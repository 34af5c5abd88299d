//! Barrier protocol coordinating worker threads with the master's release
//! pass, one round per cooperative processing cycle.
//!
//! Each worker processes up to `NUM_IDS_PER_CYCLE` individuals' worth of
//! rows per chromosome it owns, then blocks here until the master has run
//! its release pass over the newly-dumpable range and resumes everyone (or
//! lets finished workers exit). This is a direct translation of the
//! mutex/condvar pair the original tool uses for the same purpose, with
//! one condvar per direction of the handshake.

use std::sync::{Condvar, Mutex, MutexGuard};

struct State {
    num_blocked: usize,
    num_finished: usize,
    can_proceed: Vec<bool>,
    finished: Vec<bool>,
}

pub struct Barrier {
    num_workers: usize,
    state: Mutex<State>,
    workers_wait_master: Condvar,
    master_waits_workers: Condvar,
}

impl Barrier {
    pub fn new(num_workers: usize) -> Self {
        Barrier {
            num_workers,
            state: Mutex::new(State {
                num_blocked: 0,
                num_finished: 0,
                can_proceed: vec![false; num_workers],
                finished: vec![false; num_workers],
            }),
            workers_wait_master: Condvar::new(),
            master_waits_workers: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Called by a worker at the end of a processing cycle that still has
    /// more rows to process. Blocks until the master allows this worker to
    /// proceed again.
    pub fn worker_cycle_end(&self, worker_id: usize) {
        let mut state = self.lock();
        state.num_blocked += 1;
        if state.num_blocked == self.num_workers {
            self.master_waits_workers.notify_one();
        }
        while !state.can_proceed[worker_id] {
            state = self
                .workers_wait_master
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state.can_proceed[worker_id] = false;
    }

    /// Called by a worker once it has no more chromosomes to process (or
    /// has aborted due to an error). Does not block: a finished worker
    /// never needs to wait again.
    pub fn worker_finished(&self, worker_id: usize) {
        let mut state = self.lock();
        if state.finished[worker_id] {
            return;
        }
        state.finished[worker_id] = true;
        state.num_finished += 1;
        state.num_blocked += 1;
        if state.num_blocked == self.num_workers {
            self.master_waits_workers.notify_one();
        }
    }

    /// Called by the master. Blocks until every worker is either blocked at
    /// `worker_cycle_end` or has called `worker_finished`. The returned
    /// guard holds the lock for the duration of the master's release pass,
    /// matching the original tool's critical section (workers cannot
    /// observe or mutate shared state while the master is dumping).
    pub fn wait_for_all_blocked(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        while state.num_blocked < self.num_workers {
            state = self
                .master_waits_workers
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state
    }

    /// Called by the master after its release pass, with the guard
    /// returned by `wait_for_all_blocked`. Resumes every not-yet-finished
    /// worker and returns whether every worker has now finished.
    pub fn resume_workers(&self, mut state: MutexGuard<'_, State>) -> bool {
        state.num_blocked = state.finished.iter().filter(|f| **f).count();
        for (i, finished) in state.finished.iter().enumerate() {
            if !finished {
                state.can_proceed[i] = true;
            }
        }
        let done = state.num_finished == self.num_workers;
        drop(state);
        self.workers_wait_master.notify_all();
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_round_trip() {
        let barrier = Arc::new(Barrier::new(2));
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..2)
            .map(|id| {
                let barrier = Arc::clone(&barrier);
                let order = Arc::clone(&order);
                thread::spawn(move || {
                    order.lock().unwrap().push(format!("worker{id}-cycle"));
                    barrier.worker_cycle_end(id);
                    order.lock().unwrap().push(format!("worker{id}-finished"));
                    barrier.worker_finished(id);
                })
            })
            .collect();

        let guard = barrier.wait_for_all_blocked();
        order.lock().unwrap().push("master-dump".to_string());
        let done = barrier.resume_workers(guard);
        assert!(!done);

        for h in handles {
            h.join().unwrap();
        }

        let guard = barrier.wait_for_all_blocked();
        let done = barrier.resume_workers(guard);
        assert!(done);
    }

    #[test]
    fn a_worker_that_finishes_immediately_does_not_block_the_master() {
        let barrier = Arc::new(Barrier::new(2));
        let b2 = Arc::clone(&barrier);
        let h = thread::spawn(move || b2.worker_finished(1));
        h.join().unwrap();

        let b3 = Arc::clone(&barrier);
        let h2 = thread::spawn(move || {
            b3.worker_cycle_end(0);
        });

        let guard = barrier.wait_for_all_blocked();
        let done = barrier.resume_workers(guard);
        assert!(!done);
        h2.join().unwrap();
    }
}
