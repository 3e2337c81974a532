// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pooled host arrays for staged copies.

Copying between buffers of different kinds goes through host memory.  Rather than allocate a
fresh array per copy, arrays are rented from a [StagingPool] keyed by element type and size
class (the length rounded up to a power of two).  A [Rented] lease returns its array when it is
dropped, so every exit path returns it, including `?`.

Pooling affects only allocation churn.  Rented arrays have unspecified contents.
*/

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex};

const DEFAULT_MAX_PER_CLASS: usize = 4;

type SizeClass = (TypeId, usize);

#[derive(Debug)]
pub struct StagingPool {
    classes: Mutex<HashMap<SizeClass, Vec<Box<dyn Any + Send>>>>,
    outstanding: AtomicUsize,
    max_per_class: usize,
}

static SHARED: LazyLock<StagingPool> = LazyLock::new(StagingPool::new);

impl StagingPool {
    pub fn new() -> Self {
        Self::with_max_per_class(DEFAULT_MAX_PER_CLASS)
    }

    /// A pool that keeps at most `max_per_class` idle arrays per size class; extras are freed.
    pub fn with_max_per_class(max_per_class: usize) -> Self {
        StagingPool {
            classes: Mutex::new(HashMap::new()),
            outstanding: AtomicUsize::new(0),
            max_per_class,
        }
    }

    /// The process-wide pool used by [crate::bindings::Buffer::set_data_from].
    pub fn shared() -> &'static StagingPool {
        &SHARED
    }

    /// Rents an array of at least `len` elements.  The lease derefs to exactly `len`.
    pub fn rent<T: bytemuck::Zeroable + Copy + Send + 'static>(&self, len: usize) -> Rented<'_, T> {
        let class = len.next_power_of_two();
        let reused = self
            .classes
            .lock()
            .unwrap()
            .get_mut(&(TypeId::of::<T>(), class))
            .and_then(|idle| idle.pop());
        let array = match reused.map(|boxed| boxed.downcast::<Vec<T>>()) {
            Some(Ok(array)) => *array,
            //keyed by TypeId, so a mismatch can't happen; allocate anyway
            Some(Err(_)) | None => vec![T::zeroed(); class],
        };
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        Rented {
            pool: self,
            array: Some(array),
            len,
        }
    }

    /// Leases not yet returned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Idle arrays held across all size classes.
    pub fn retained(&self) -> usize {
        self.classes.lock().unwrap().values().map(Vec::len).sum()
    }

    fn give_back<T: Send + 'static>(&self, array: Vec<T>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        let mut classes = self.classes.lock().unwrap();
        let idle = classes.entry((TypeId::of::<T>(), array.len())).or_default();
        if idle.len() < self.max_per_class {
            idle.push(Box::new(array));
        }
    }
}

impl Default for StagingPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An array on loan from a [StagingPool].
pub struct Rented<'a, T: Send + 'static> {
    pool: &'a StagingPool,
    array: Option<Vec<T>>,
    len: usize,
}

impl<T: Send + 'static> Rented<'_, T> {
    /// Returns the array now.  Dropping the lease does the same.
    pub fn give_back(mut self) {
        self.return_array();
    }

    fn return_array(&mut self) {
        if let Some(array) = self.array.take() {
            self.pool.give_back(array);
        }
    }
}

impl<T: Send + 'static> Deref for Rented<'_, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        match &self.array {
            Some(array) => &array[..self.len],
            None => &[],
        }
    }
}

impl<T: Send + 'static> DerefMut for Rented<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        let len = self.len;
        match &mut self.array {
            Some(array) => &mut array[..len],
            None => &mut [],
        }
    }
}

impl<T: Send + 'static> Drop for Rented<'_, T> {
    fn drop(&mut self) {
        self.return_array();
    }
}

impl<T: Send + 'static> Debug for Rented<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rented").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_has_requested_len() {
        let pool = StagingPool::new();
        let rented = pool.rent::<u32>(5);
        assert_eq!(rented.len(), 5);
        assert_eq!(pool.outstanding(), 1);
        drop(rented);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn same_class_is_reused() {
        let pool = StagingPool::new();
        let mut first = pool.rent::<u32>(6);
        first[0] = 42;
        let ptr = first.as_ptr();
        first.give_back();
        //6 and 7 share the 8-element class
        let second = pool.rent::<u32>(7);
        assert_eq!(second.as_ptr(), ptr);
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn types_do_not_share_arrays() {
        let pool = StagingPool::new();
        pool.rent::<u32>(4).give_back();
        let floats = pool.rent::<f32>(4);
        assert_eq!(floats.len(), 4);
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn returned_on_early_exit() {
        fn fails(pool: &StagingPool) -> Result<(), &'static str> {
            let _rented = pool.rent::<u8>(16);
            Err("copy failed")
        }
        let pool = StagingPool::new();
        assert!(fails(&pool).is_err());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn retention_is_capped() {
        let pool = StagingPool::with_max_per_class(1);
        let a = pool.rent::<u32>(2);
        let b = pool.rent::<u32>(2);
        drop(a);
        drop(b);
        assert_eq!(pool.retained(), 1);
        assert_eq!(pool.outstanding(), 0);
    }
}
