//! Single-threaded job dispatch with bounded inline recursion.
//!
//! All graph mutation happens on one thread; collaborators still need to post work from inside
//! other work (an operator invalidating a drawable mid-frame, a cache hook scheduling a
//! snapshot). [`Dispatcher`] runs such jobs inline while the nesting depth stays under a cap
//! and queues them beyond it, draining the queue when the outermost job completes. The depth is
//! an explicit counter, not thread-local state, so the policy is testable without threads.

use std::collections::VecDeque;

/// Default inline nesting cap.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// A unit of work against the shared context `C`. Jobs may dispatch further jobs.
pub type Job<C> = Box<dyn FnOnce(&mut C, &mut Dispatcher<C>)>;

/// Explicit single-threaded executor with a reentrancy cap.
pub struct Dispatcher<C> {
    queue: VecDeque<Job<C>>,
    depth: usize,
    max_depth: usize,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl<C> Dispatcher<C> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            depth: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Current inline nesting depth; zero outside any job.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of queued, not-yet-run jobs.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue `job` without running it; it runs when the current (or next) dispatch drains.
    pub fn post(&mut self, job: impl FnOnce(&mut C, &mut Dispatcher<C>) + 'static) {
        self.queue.push_back(Box::new(job));
    }

    /// Run `job` inline if the nesting cap allows, otherwise queue it.
    ///
    /// When the outermost inline job completes, queued jobs are drained in posting order.
    pub fn execute(&mut self, ctx: &mut C, job: impl FnOnce(&mut C, &mut Dispatcher<C>) + 'static) {
        if self.depth >= self.max_depth {
            self.queue.push_back(Box::new(job));
            return;
        }
        self.depth += 1;
        job(ctx, self);
        self.depth -= 1;
        if self.depth == 0 {
            self.drain(ctx);
        }
    }

    /// Run queued jobs to completion.
    ///
    /// No-op while a dispatch is already on the stack; the in-flight dispatch drains the
    /// queue itself when it unwinds.
    pub fn flush(&mut self, ctx: &mut C) {
        if self.depth == 0 {
            self.drain(ctx);
        }
    }

    fn drain(&mut self, ctx: &mut C) {
        while let Some(job) = self.queue.pop_front() {
            self.depth += 1;
            job(ctx, self);
            self.depth -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_execute_runs_inline_below_the_cap() {
        let mut dispatcher = Dispatcher::new(4);
        let mut log: Vec<u32> = Vec::new();
        dispatcher.execute(&mut log, |log, d| {
            log.push(1);
            d.execute(log, |log, _| log.push(2));
            // Inline nesting means 2 ran before this line.
            log.push(3);
        });
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[test]
    fn beyond_the_cap_jobs_are_deferred_to_the_drain() {
        let mut dispatcher = Dispatcher::new(2);
        let mut log: Vec<u32> = Vec::new();
        dispatcher.execute(&mut log, |log, d| {
            log.push(1);
            d.execute(log, |log, d| {
                log.push(2);
                // Depth cap reached: this queues instead of recursing.
                d.execute(log, |log, _| log.push(4));
                log.push(3);
            });
        });
        assert_eq!(log, vec![1, 2, 3, 4]);
    }

    #[test]
    fn posted_jobs_run_in_order_after_the_outermost_job() {
        let mut dispatcher = Dispatcher::new(4);
        let mut log: Vec<u32> = Vec::new();
        dispatcher.execute(&mut log, |log, d| {
            d.post(|log, _| log.push(2));
            d.post(|log, _| log.push(3));
            log.push(1);
        });
        assert_eq!(log, vec![1, 2, 3]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn drained_jobs_may_queue_more() {
        let mut dispatcher = Dispatcher::new(4);
        let mut log: Vec<u32> = Vec::new();
        dispatcher.post(|log: &mut Vec<u32>, d: &mut Dispatcher<Vec<u32>>| {
            log.push(1);
            d.post(|log, _| log.push(2));
        });
        dispatcher.execute(&mut log, |_, _| {});
        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn flush_runs_posted_jobs_outside_any_dispatch() {
        let mut dispatcher = Dispatcher::new(4);
        let mut log: Vec<u32> = Vec::new();
        dispatcher.post(|log: &mut Vec<u32>, d: &mut Dispatcher<Vec<u32>>| {
            log.push(1);
            d.post(|log, _| log.push(2));
        });
        dispatcher.flush(&mut log);
        assert_eq!(log, vec![1, 2]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn unbounded_recursion_is_cut_off_by_the_cap() {
        fn recurse(count: &mut usize, d: &mut Dispatcher<usize>) {
            *count += 1;
            if *count < 100 {
                d.execute(count, |count, d| recurse(count, d));
            }
        }

        let mut dispatcher = Dispatcher::new(3);
        let mut count = 0usize;
        dispatcher.execute(&mut count, |count, d| recurse(count, d));
        // All 100 jobs ran, just not all on one stack.
        assert_eq!(count, 100);
    }
}
