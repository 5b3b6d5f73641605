// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic, thread-safe free-list of reusable objects.

use crossbeam::queue::SegQueue;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A concurrent free-list that hands out recycled objects and creates new
/// ones on demand.
///
/// The pool is unbounded: it never refuses an [`acquire`](Self::acquire) and
/// never drops a [`release`](Self::release)d object. Any warm-up size passed to
/// [`with_warm`](Self::with_warm) is a starting point, not a cap.
///
/// Objects are returned as-is. Resetting state between uses is the caller's
/// job (see `InstancePool` in `tether-audio`).
pub struct RecyclingPool<T> {
    free: SegQueue<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    created: AtomicUsize,
}

impl<T> RecyclingPool<T> {
    /// Creates an empty pool that builds new objects with `factory`.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            free: SegQueue::new(),
            factory: Box::new(factory),
            created: AtomicUsize::new(0),
        }
    }

    /// Creates a pool and preallocates `warm` objects.
    pub fn with_warm(warm: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let pool = Self::new(factory);
        for _ in 0..warm {
            let item = pool.create();
            pool.free.push(item);
        }
        pool
    }

    /// Pops a free object, or builds a new one if the free-list is empty.
    pub fn acquire(&self) -> T {
        match self.free.pop() {
            Some(item) => item,
            None => self.create(),
        }
    }

    /// Pushes an object back onto the free-list.
    ///
    /// The caller must not keep using `item` (or anything aliasing it) afterwards.
    pub fn release(&self, item: T) {
        self.free.push(item);
    }

    /// The number of objects currently sitting in the free-list.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// The number of objects this pool has ever built, warm-up included.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn create(&self) -> T {
        self.created.fetch_add(1, Ordering::Relaxed);
        (self.factory)()
    }
}

impl<T> fmt::Debug for RecyclingPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecyclingPool")
            .field("idle", &self.idle())
            .field("created", &self.created())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_builds_when_empty() {
        let pool = RecyclingPool::new(|| vec![0u8; 4]);
        assert_eq!(pool.idle(), 0);

        let item = pool.acquire();
        assert_eq!(item.len(), 4);
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn released_object_is_reused() {
        let pool = RecyclingPool::new(|| Box::new(0u32));
        let mut item = pool.acquire();
        *item = 7;
        let addr = &*item as *const u32;
        pool.release(item);

        let again = pool.acquire();
        assert_eq!(&*again as *const u32, addr);
        assert_eq!(*again, 7, "pool hands objects back untouched");
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn warm_pool_preallocates() {
        let pool = RecyclingPool::with_warm(8, String::new);
        assert_eq!(pool.idle(), 8);
        assert_eq!(pool.created(), 8);

        let taken: Vec<_> = (0..10).map(|_| pool.acquire()).collect();
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.created(), 10, "warm size is a soft bound");

        for item in taken {
            pool.release(item);
        }
        assert_eq!(pool.idle(), 10);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(RecyclingPool::with_warm(4, || 0u64));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let item = pool.acquire();
                        pool.release(item);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }

        assert_eq!(pool.idle(), pool.created());
        assert!(pool.created() <= 8);
    }
}
