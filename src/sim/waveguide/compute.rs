use tracing::debug;

use crate::sim::waveguide::error::{Result, WaveguideError};

/// Dedicated worker pool on which every step is dispatched.
///
/// A dispatch blocks the calling thread until all workers are done, so no
/// step can start before the previous one has been written.
pub struct ComputeContext {
    pool: rayon::ThreadPool,
}

impl ComputeContext {
    /// Builds a pool with `num_threads` workers, or one per core for `None`.
    pub fn new(num_threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("waveguide-{}", i));
        if let Some(n) = num_threads {
            if n == 0 {
                return Err(WaveguideError::config("thread count must be at least 1"));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| WaveguideError::resource(format!("failed to build thread pool: {}", e)))?;
        debug!("Compute context with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the pool and waits for it.
    pub fn dispatch<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
