//! Shared syscall tables, map layouts and filter stages for syscap
//!
//! This crate is compiled twice: with `std` for the userspace agent, and
//! without default features for the eBPF program. Everything outside
//! [`types`] must stay `no_std` and allocation free.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod abi;
pub mod filter;
pub mod maps;
pub mod pipeline;
pub mod syscalls;

#[cfg(feature = "std")]
pub mod types;

pub use abi::{Arch, ArchProfile};
pub use filter::{FilterMapEntry, UserPath, FILTER_PREFIX_SLOTS, PREFIX_LEN};
pub use pipeline::{Direction, DropReason, Flow};

#[cfg(feature = "std")]
pub use types::events::*;
