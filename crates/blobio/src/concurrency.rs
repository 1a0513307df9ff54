//! Fan-out policy for ranged reads.

use crate::{BlobError, Result};

/// Default minimum number of bytes each concurrent request should read (16 MiB).
pub const DEFAULT_MIN_BYTES_PER_WORKER: u64 = 1 << 24;

/// Default maximum number of concurrent requests per ranged read.
pub const DEFAULT_MAX_WORKERS: u16 = 64;

/// Configures how many concurrent requests a single ranged read may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPolicy {
    min_bytes_per_worker: u64,
    max_workers: u16,
}

impl ConcurrencyPolicy {
    /// Build a policy; both values must be strictly positive.
    pub fn new(min_bytes_per_worker: u64, max_workers: u16) -> Result<Self> {
        if min_bytes_per_worker == 0 {
            return Err(BlobError::InvalidPolicy(
                "minimum bytes per worker must be positive".to_string(),
            ));
        }
        if max_workers == 0 {
            return Err(BlobError::InvalidPolicy(
                "maximum workers must be positive".to_string(),
            ));
        }
        Ok(Self {
            min_bytes_per_worker,
            max_workers,
        })
    }

    /// Minimum number of bytes read per concurrent request.
    pub fn min_bytes_per_worker(&self) -> u64 {
        self.min_bytes_per_worker
    }

    /// Maximum number of concurrent requests.
    pub fn max_workers(&self) -> u16 {
        self.max_workers
    }

    /// Number of parallel sub-requests for a read of `total_bytes`.
    pub fn worker_count(&self, total_bytes: u64) -> u16 {
        if total_bytes <= self.min_bytes_per_worker {
            return 1;
        }
        let workers = total_bytes / self.min_bytes_per_worker;
        workers.clamp(1, u64::from(self.max_workers)) as u16
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            min_bytes_per_worker: DEFAULT_MIN_BYTES_PER_WORKER,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_reads_use_one_worker() {
        let policy = ConcurrencyPolicy::default();
        assert_eq!(policy.worker_count(0), 1);
        assert_eq!(policy.worker_count(1), 1);
        assert_eq!(policy.worker_count(DEFAULT_MIN_BYTES_PER_WORKER), 1);
    }

    #[test]
    fn test_rounds_down() {
        let policy = ConcurrencyPolicy::new(100, 64).unwrap();
        assert_eq!(policy.worker_count(101), 1);
        assert_eq!(policy.worker_count(199), 1);
        assert_eq!(policy.worker_count(200), 2);
        assert_eq!(policy.worker_count(1_050), 10);
    }

    #[test]
    fn test_clamped_to_max_workers() {
        let policy = ConcurrencyPolicy::new(10, 8).unwrap();
        assert_eq!(policy.worker_count(80), 8);
        assert_eq!(policy.worker_count(u64::MAX), 8);

        let policy = ConcurrencyPolicy::default();
        assert_eq!(policy.worker_count(1 << 40), DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let policy = ConcurrencyPolicy::new(7, 5).unwrap();
        let mut previous = 0;
        for total in 0..200u64 {
            let workers = policy.worker_count(total);
            assert!((1..=5).contains(&workers));
            assert!(workers >= previous);
            previous = workers;
        }
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(matches!(
            ConcurrencyPolicy::new(0, 4),
            Err(BlobError::InvalidPolicy(_))
        ));
        assert!(matches!(
            ConcurrencyPolicy::new(1024, 0),
            Err(BlobError::InvalidPolicy(_))
        ));
    }
}
