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

//! Pooled, fixed-shape containers for deferred function calls.
//!
//! A [`CaptureSlot`] is a function pointer plus up to four arguments. Slots
//! live in one [`CapturePool`] per argument shape, and the pools themselves
//! live in a [`CaptureRegistry`] keyed by [`TypeId`]. Once a pool is warm,
//! queueing a deferred call moves a recycled `Box` around instead of
//! allocating a fresh closure.

use super::pool::RecyclingPool;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// An argument tuple that can be captured by a [`CaptureSlot`].
///
/// Implemented for `()` and tuples of one to four `Send + 'static` values.
/// Each shape pairs with a plain function pointer taking the unpacked
/// arguments, so `(u32, String)` captures for a `fn(u32, String)`.
pub trait CaptureArgs: Send + Sized + 'static {
    /// The function pointer type invoked with these arguments.
    type Func: Copy + Send + 'static;

    /// The number of captured arguments.
    const ARITY: usize;

    /// Calls `func` with the unpacked arguments.
    fn invoke(func: Self::Func, args: Self);
}

impl CaptureArgs for () {
    type Func = fn();
    const ARITY: usize = 0;

    fn invoke(func: Self::Func, _args: Self) {
        func()
    }
}

macro_rules! impl_capture_args {
    ($arity:expr; $($ty:ident $arg:ident),+) => {
        impl<$($ty: Send + 'static),+> CaptureArgs for ($($ty,)+) {
            type Func = fn($($ty),+);
            const ARITY: usize = $arity;

            fn invoke(func: Self::Func, ($($arg,)+): Self) {
                func($($arg),+)
            }
        }
    };
}

impl_capture_args!(1; A a);
impl_capture_args!(2; A a, B b);
impl_capture_args!(3; A a, B b, C c);
impl_capture_args!(4; A a, B b, C c, D d);

/// The free-list that owns every [`CaptureSlot`] of one argument shape.
pub type CapturePool<A> = RecyclingPool<Box<CaptureSlot<A>>>;

/// A reusable container holding one deferred call.
///
/// A filled slot is exclusively owned by the queue entry carrying it. Running
/// it empties the slot and sends it back to the pool it came from, whether
/// the call returns or unwinds.
pub struct CaptureSlot<A: CaptureArgs> {
    call: Option<(A::Func, A)>,
    home: Weak<CapturePool<A>>,
}

impl<A: CaptureArgs> CaptureSlot<A> {
    fn empty(home: Weak<CapturePool<A>>) -> Self {
        Self { call: None, home }
    }

    /// Stores `func` and `args` in the slot, replacing any previous contents.
    pub fn fill(&mut self, func: A::Func, args: A) {
        self.call = Some((func, args));
    }

    /// Returns `true` if the slot currently holds a call.
    pub fn is_filled(&self) -> bool {
        self.call.is_some()
    }

    /// Builds a pool whose slots know how to find their way back to it.
    pub fn pool(warm: usize) -> Arc<CapturePool<A>> {
        Arc::new_cyclic(|home: &Weak<CapturePool<A>>| {
            let home = home.clone();
            RecyclingPool::with_warm(warm, move || Box::new(CaptureSlot::empty(home.clone())))
        })
    }
}

impl<A: CaptureArgs> fmt::Debug for CaptureSlot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSlot")
            .field("arity", &A::ARITY)
            .field("filled", &self.is_filled())
            .finish()
    }
}

/// A type-erased unit of work that the dispatcher can run exactly once.
pub(crate) trait Deferred: Send {
    fn run(self: Box<Self>);
}

impl<A: CaptureArgs> Deferred for CaptureSlot<A> {
    fn run(mut self: Box<Self>) {
        let call = self.call.take();
        // Returned on drop, so an unwinding call still recycles the slot.
        let _slot = ReturnToPool(Some(self));
        if let Some((func, args)) = call {
            A::invoke(func, args);
        }
    }
}

struct ReturnToPool<A: CaptureArgs>(Option<Box<CaptureSlot<A>>>);

impl<A: CaptureArgs> Drop for ReturnToPool<A> {
    fn drop(&mut self) {
        if let Some(slot) = self.0.take() {
            if let Some(pool) = slot.home.upgrade() {
                pool.release(slot);
            }
        }
    }
}

/// A boxed closure, for callers that need to capture more than a fixed tuple.
pub(crate) struct ClosureCall<F>(pub(crate) F);

impl<F: FnOnce() + Send> Deferred for ClosureCall<F> {
    fn run(self: Box<Self>) {
        (self.0)()
    }
}

/// A type-map holding one [`CapturePool`] per argument shape.
pub(crate) struct CaptureRegistry {
    pools: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    warm: usize,
}

impl CaptureRegistry {
    pub(crate) fn new(warm: usize) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            warm,
        }
    }

    /// Fetches the pool for `A`, creating it on first use.
    pub(crate) fn pool<A: CaptureArgs>(&self) -> Arc<CapturePool<A>> {
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = pools.entry(TypeId::of::<A>()).or_insert_with(|| {
            log::debug!(
                "Creating capture pool for {} (arity {}, warm {})",
                std::any::type_name::<A>(),
                A::ARITY,
                self.warm
            );
            CaptureSlot::<A>::pool(self.warm) as Arc<dyn Any + Send + Sync>
        });

        match entry.clone().downcast::<CapturePool<A>>() {
            Ok(pool) => pool,
            // Keys are derived from `A`, so the stored pool always has this type.
            Err(_) => unreachable!("capture pool registered under the wrong TypeId"),
        }
    }

    /// Number of distinct argument shapes seen so far.
    pub(crate) fn len(&self) -> usize {
        self.pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for CaptureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRegistry")
            .field("pools", &self.len())
            .field("warm", &self.warm)
            .finish()
    }
}
