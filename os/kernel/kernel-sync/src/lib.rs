//! # Kernel synchronization primitives
//!
//! The page allocator keeps its critical sections short and non-blocking, so
//! the only primitive it needs is a named spin lock. Names show up in
//! diagnostics and make lock-order documentation concrete
//! (`"pmm.refcount"` before `"pmm.freelist"`).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{LockStats, SpinLock, SpinLockGuard};
