// Background execution of periodic feedback loops
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::controller::Periodic;
use crate::time::Clock;

/// A feedback loop iterating on its own thread at its fixed period.
///
/// The loop never stops on its own, not even when it converges: it keeps holding the goal until
/// it is paused or cancelled. The guard returned by [`lock`](ParallelTask::lock) is the single
/// writer: while it is held, the background thread waits before its next iteration.
pub struct ParallelTask<P> {
    task: Arc<Mutex<P>>,
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Moves `task` onto a new thread that calls `run_continuous` once per period, paced by a clone
/// of the task's own clock.
pub fn run_parallel<P>(task: P) -> ParallelTask<P>
where
    P: Periodic + Send + 'static,
    P::Clock: Clone + Send + 'static,
{
    let clock = task.clock().clone();
    let task = Arc::new(Mutex::new(task));
    let paused = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));

    let handle = {
        let task = Arc::clone(&task);
        let paused = Arc::clone(&paused);
        let cancelled = Arc::clone(&cancelled);
        thread::spawn(move || {
            let mut next = clock.now();
            while !cancelled.load(Ordering::Acquire) {
                let period = {
                    let mut task = task.lock();
                    if !paused.load(Ordering::Acquire) {
                        task.run_continuous();
                    }
                    task.period()
                };
                next = next + period;
                clock.delay_until(next);
            }
            debug!("Background loop cancelled");
        })
    };

    ParallelTask {
        task,
        paused,
        cancelled,
        handle: Some(handle),
    }
}

impl<P> ParallelTask<P> {
    /// Exclusive access to the running task, e.g. to change its goal.
    pub fn lock(&self) -> MutexGuard<'_, P> {
        self.task.lock()
    }

    /// Suspends iterating. The actuator keeps its last command.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Stops the background thread after its current iteration and hands the task back.
    ///
    /// Returns `None` only if the background thread panicked.
    pub fn cancel(mut self) -> Option<P> {
        self.stop().ok()?;
        let task = self.task.clone();
        drop(self);
        Arc::try_unwrap(task).ok().map(Mutex::into_inner)
    }

    fn stop(&mut self) -> thread::Result<()> {
        self.cancelled.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl<P> Drop for ParallelTask<P> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
