use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reader-writer latch: many concurrent readers or one exclusive writer.
///
/// A thin wrapper over `RwLock` that never surfaces poisoning. A latch holder that panicked
/// leaves the protected bytes as they were, which is what a page latch wants anyway.
/// No fairness between readers and writers is promised.
#[derive(Debug, Default)]
pub struct ReaderWriterLatch<T> {
    inner: RwLock<T>,
}

impl<T> ReaderWriterLatch<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Acquire a read latch.
    pub fn rlock(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire a write latch.
    pub fn wlock(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ReaderWriterLatch;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn readers_share_writers_exclude() {
        let latch = Arc::new(ReaderWriterLatch::new(0u64));

        {
            let r1 = latch.rlock();
            let r2 = latch.rlock();
            assert_eq!(*r1 + *r2, 0);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *latch.wlock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*latch.rlock(), 8000);
    }

    #[test]
    fn poisoned_latch_stays_usable() {
        let latch = Arc::new(ReaderWriterLatch::new(7));

        let cloned = Arc::clone(&latch);
        let res = thread::spawn(move || {
            let _guard = cloned.wlock();
            panic!("latch holder died");
        })
        .join();
        assert!(res.is_err());

        assert_eq!(*latch.rlock(), 7);
        *latch.wlock() = 8;
        assert_eq!(*latch.rlock(), 8);
    }
}
