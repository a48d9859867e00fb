//! Userspace event types

pub mod events;
