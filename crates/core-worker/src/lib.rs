//! Fixed-size worker pool used only inside `ViewState::refilter` (§4.6).
//!
//! Grounded on `rofi_view_refilter`'s chunked `filter_elements` fan-out
//! (`examples/original_source/source/view.c`), re-expressed as a join-based
//! barrier per §9's design note rather than porting the C side's counter +
//! `GCond`/`GMutex` pair — there is no idiomatic Rust mirror for that and a
//! channel-based barrier is behaviourally equivalent.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const IDLE_RETIRE: Duration = Duration::from_secs(60);
const MAX_THREADS: usize = 128;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size (but lazily (re-)spawned) pool of worker threads.
///
/// Threads that sit idle for [`IDLE_RETIRE`] exit; the next `execute` call
/// notices the shortfall and tops the pool back up. This keeps a Rofi process
/// that opens, filters once and exits from holding idle OS threads for its
/// whole lifetime.
pub struct WorkerPool {
    size: usize,
    job_tx: crossbeam_channel::Sender<Job>,
    job_rx: crossbeam_channel::Receiver<Job>,
    live: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// `threads == 0` auto-sizes to `min(available_parallelism, 128)`.
    pub fn new(threads: usize) -> Self {
        let size = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_THREADS)
        } else {
            threads.min(MAX_THREADS)
        };
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        Self {
            size,
            job_tx,
            job_rx,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn top_up(&self) {
        let live = self.live.load(Ordering::Relaxed);
        for _ in live..self.size {
            let rx = self.job_rx.clone();
            let live = Arc::clone(&self.live);
            live.fetch_add(1, Ordering::Relaxed);
            std::thread::Builder::new()
                .name("rofi-worker".into())
                .spawn(move || {
                    loop {
                        match rx.recv_timeout(IDLE_RETIRE) {
                            Ok(job) => job(),
                            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
                            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    live.fetch_sub(1, Ordering::Relaxed);
                })
                .expect("spawning a worker thread");
        }
    }

    /// Run each item in `chunks` to completion before returning. The last
    /// chunk always runs inline on the calling thread (the InputLoop thread
    /// contributes capacity instead of sitting idle), the rest are farmed out
    /// to the pool. Blocks until every chunk has completed.
    pub fn execute<F>(&self, mut chunks: Vec<F>)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(inline) = chunks.pop() else {
            return;
        };
        if chunks.is_empty() {
            inline();
            return;
        }
        self.top_up();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(chunks.len());
        for chunk in chunks.drain(..) {
            let done_tx = done_tx.clone();
            let job: Job = Box::new(move || {
                chunk();
                let _ = done_tx.send(());
            });
            self.job_tx.send(job).expect("worker pool receiver dropped");
        }
        drop(done_tx);
        inline();
        let expected = done_rx.capacity().unwrap_or(0);
        for _ in 0..expected {
            let _ = done_rx.recv();
        }
    }

    /// Current count of live (not yet idle-retired) worker threads. Exposed
    /// for tests and diagnostics only.
    pub fn live_threads(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn auto_sizes_to_at_least_one() {
        let pool = WorkerPool::new(0);
        assert!(pool.size() >= 1);
        assert!(pool.size() <= MAX_THREADS);
    }

    #[test]
    fn explicit_size_is_clamped() {
        let pool = WorkerPool::new(9999);
        assert_eq!(pool.size(), MAX_THREADS);
    }

    #[test]
    fn execute_runs_all_chunks_and_joins() {
        let pool = WorkerPool::new(4);
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut chunks: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
        for i in 0..8 {
            let results = Arc::clone(&results);
            chunks.push(Box::new(move || {
                results.lock().unwrap().push(i);
            }));
        }
        pool.execute(chunks);
        let mut got = results.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn execute_with_single_chunk_runs_inline_only() {
        let pool = WorkerPool::new(4);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        pool.execute(vec![Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }) as Box<dyn FnOnce() + Send>]);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(pool.live_threads(), 0);
    }

    #[test]
    fn execute_empty_is_a_no_op() {
        let pool = WorkerPool::new(2);
        pool.execute(Vec::<Box<dyn FnOnce() + Send>>::new());
    }
}
