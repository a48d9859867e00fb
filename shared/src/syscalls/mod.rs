//! Canonical syscall numbering
//!
//! The canonical id space is the native 64-bit numbering of the host. Name
//! tables are only shipped for x86_64; other architectures resolve ids by
//! number.

pub mod ia32;
pub mod socketcall;
pub mod x86_64;

/// Size of every id-indexed table (interest set, dispatch table).
pub const SYSCALL_TABLE_SIZE: u32 = 512;

/// Marker stored in the kernel translation table for unsupported ids.
pub const UNSUPPORTED: u32 = u32::MAX;

/// Look up the x86_64 name of a canonical syscall id.
pub fn syscall_name(id: u32) -> Option<&'static str> {
    x86_64::SYSCALLS
        .binary_search_by_key(&id, |&(nr, _)| nr)
        .ok()
        .map(|idx| x86_64::SYSCALLS[idx].1)
}

/// Look up a canonical syscall id by its x86_64 name.
pub fn syscall_id(name: &str) -> Option<u32> {
    x86_64::SYSCALLS
        .iter()
        .find(|&&(_, n)| n == name)
        .map(|&(nr, _)| nr)
}
