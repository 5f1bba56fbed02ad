//! # Kernel Memory Configuration
//!
//! This crate is the single source of truth for the physical memory window the
//! kernel manages and for how the kernel reaches physical memory once paging
//! is enabled. The page allocator, the page-table layer, and the boot code all
//! read their constants from here so they cannot drift apart.
//!
//! ## Memory Layout ([`memory`])
//!
//! ```text
//! Physical Address Space:
//! PHYS_BASE   ┌─────────────────────────────────┐
//!             │   Kernel image (text, data)     │  reserved, never handed out
//! kernel end  ├─────────────────────────────────┤
//!             │   Managed pages                 │  owned by the page allocator
//! PHYS_STOP   └─────────────────────────────────┘
//! ```
//!
//! The end of the kernel image is only known at link time and is passed to
//! the allocator at boot; everything else is a compile-time constant.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
