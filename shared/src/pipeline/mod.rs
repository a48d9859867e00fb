//! Syscall-exit filter stages
//!
//! Each stage is a small pure function over the traits below and returns a
//! [`Flow`]: `Ok` carries the event forward, `Err` is a silent drop. The
//! kernel program and the userspace agent run the same stages over their own
//! implementations of the traits (BPF maps vs. config snapshots).

mod admission;
mod prefix;
mod resolver;

pub use admission::{admit, KeepAll};
pub use prefix::{check_prefix_filter, prefix_matches, PrefixPass};
pub use resolver::resolve_syscall_id;

use crate::abi::ArchProfile;
use crate::filter::{FilterMapEntry, UserPath};

/// Stage result; `Err` means "stop processing this event".
pub type Flow<T> = Result<T, DropReason>;

/// Why an event was dropped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Compat id with no canonical counterpart
    UnsupportedCompat { raw: u32 },
    /// Socketcall with an unknown operation selector
    UnknownSocketcall { selector: u64 },
    /// Canonical id outside the interest set
    NotInteresting,
    /// External sampling decision
    SampledOut,
    /// Failed syscall while drop-on-failure is enabled
    Failed,
    /// String argument matched a configured prefix
    PrefixMatch { path: UserPath },
    /// No handler registered for the canonical id
    NoHandler,
}

impl DropReason {
    /// Stable label for metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnsupportedCompat { .. } => "unsupported_compat",
            DropReason::UnknownSocketcall { .. } => "unknown_socketcall",
            DropReason::NotInteresting => "not_interesting",
            DropReason::SampledOut => "sampled_out",
            DropReason::Failed => "failed",
            DropReason::PrefixMatch { .. } => "prefix_match",
            DropReason::NoHandler => "no_handler",
        }
    }
}

/// Syscall boundary a sampling decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Enter,
    Exit,
}

/// Register snapshot taken at syscall exit.
pub trait SyscallRegs {
    fn raw_syscall_id(&self) -> u32;

    /// Syscall argument `index` (0-based) in the calling convention of the
    /// current execution mode.
    fn arg(&self, index: usize) -> u64;

    /// True when a 64-bit kernel services a 32-bit task.
    fn in_compat_syscall(&self) -> bool;
}

/// Read-only configuration consulted on the hot path.
pub trait ExitTables {
    fn is_interesting(&self, id: u32) -> bool;

    fn drop_failed(&self) -> bool;

    fn filter_for(&self, id: u32) -> Option<&FilterMapEntry>;

    fn compat_to_canonical(&self, raw: u32) -> Option<u32>;
}

/// Opaque sampling decision; `true` skips the event.
pub trait Sampler {
    fn sample_out(&self, id: u32, direction: Direction) -> bool;
}

/// Fault-tolerant access to the traced task's memory.
pub trait UserMemory {
    /// Copy a NUL-terminated string at `addr` into `buf`, always leaving it
    /// terminated. Returns the string length without the NUL, or `None` if
    /// the read faulted.
    fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize>;
}

/// An event that survived every stage and may be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    pub syscall_id: u32,
    pub prefix: PrefixPass,
}

/// Run resolver, admission and prefix stages in order.
pub fn run_exit<R, T, S, M>(
    regs: &R,
    ret: i64,
    tables: &T,
    sampler: &S,
    memory: &M,
    profile: &ArchProfile,
) -> Flow<Admitted>
where
    R: SyscallRegs,
    T: ExitTables,
    S: Sampler + ?Sized,
    M: UserMemory,
{
    let id = resolve_syscall_id(regs, tables, profile)?;
    let id = admit(id, ret, tables, sampler)?;
    let prefix = check_prefix_filter(id, regs, tables, memory, profile.max_prefixes)?;
    Ok(Admitted {
        syscall_id: id,
        prefix,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory trait implementations for stage tests.

    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Debug, Default, Clone, Copy)]
    pub struct Regs {
        pub id: u32,
        pub args: [u64; 6],
        pub compat: bool,
    }

    impl SyscallRegs for Regs {
        fn raw_syscall_id(&self) -> u32 {
            self.id
        }

        fn arg(&self, index: usize) -> u64 {
            self.args.get(index).copied().unwrap_or_default()
        }

        fn in_compat_syscall(&self) -> bool {
            self.compat
        }
    }

    #[derive(Default)]
    pub struct Tables {
        pub interesting: Option<HashSet<u32>>,
        pub drop_failed: bool,
        pub filters: HashMap<u32, FilterMapEntry>,
        pub compat: HashMap<u32, u32>,
    }

    impl ExitTables for Tables {
        fn is_interesting(&self, id: u32) -> bool {
            self.interesting
                .as_ref()
                .map_or(true, |set| set.contains(&id))
        }

        fn drop_failed(&self) -> bool {
            self.drop_failed
        }

        fn filter_for(&self, id: u32) -> Option<&FilterMapEntry> {
            self.filters.get(&id)
        }

        fn compat_to_canonical(&self, raw: u32) -> Option<u32> {
            self.compat.get(&raw).copied()
        }
    }

    /// Fake address space: address -> string. Unknown addresses fault.
    #[derive(Default)]
    pub struct Memory(pub HashMap<u64, &'static str>);

    impl UserMemory for Memory {
        fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize> {
            let s = self.0.get(&addr)?.as_bytes();
            let len = s.len().min(buf.len() - 1);
            buf[..len].copy_from_slice(&s[..len]);
            buf[len] = 0;
            Some(len)
        }
    }
}
