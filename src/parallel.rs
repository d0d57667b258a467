//! Explicit thread-pool selection for the parallel kernels.

use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};

/// How many worker threads a parallel kernel may use.
///
/// Passed explicitly to every kernel that fans out work; there is no process
/// wide setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    /// `0` runs on rayon's global pool, `n` on a dedicated pool of `n` threads.
    pub max_workers: usize,
}

impl ParallelConfig {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers }
    }

    /// Runs `op` inside the selected pool. Parallel iterators used by `op`
    /// inherit that pool.
    pub fn install<R, F>(&self, op: F) -> Result<R, ThreadPoolBuildError>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.max_workers == 0 {
            return Ok(op());
        }
        let pool = ThreadPoolBuilder::new().num_threads(self.max_workers).build()?;
        log::debug!("Running on a dedicated pool of {} threads", self.max_workers);
        Ok(pool.install(op))
    }
}
