//! BPF map names and value layouts shared with the kernel program
//!
//! Every value type here is `#[repr(C)]` with explicit padding so both sides
//! agree on the byte layout.

use crate::abi::{Arch, ArchProfile};

pub const INTERESTING_SYSCALLS: &str = "INTERESTING_SYSCALLS";
pub const SETTINGS: &str = "SETTINGS";
pub const SYSCALL_FILTERS: &str = "SYSCALL_FILTERS";
pub const IA32_TO_64: &str = "IA32_TO_64";
pub const SAMPLED_OUT: &str = "SAMPLED_OUT";
pub const SYSCALL_EXIT_TAIL_TABLE: &str = "SYSCALL_EXIT_TAIL_TABLE";
pub const EXIT_SCRATCH: &str = "EXIT_SCRATCH";
pub const SYSCALL_EXIT_EVENTS: &str = "SYSCALL_EXIT_EVENTS";

/// Program attached to `sys_exit`
pub const EXIT_PROGRAM: &str = "sys_exit";

/// Tail-call target that emits an admitted event to userspace
pub const EMIT_PROGRAM: &str = "sys_exit_emit";

/// Max entries of `SYSCALL_FILTERS`
pub const MAX_FILTERS: u32 = 256;

/// Task comm length, NUL included
pub const TASK_COMM_LEN: usize = 16;

/// `thread_info.status` bit set while a task runs an ia32 syscall
pub const TS_COMPAT: u32 = 0x0002;

const ARCH_X86_64: u32 = 0;
const ARCH_AARCH64: u32 = 1;

/// Scalar settings, stored at index 0 of `SETTINGS`
///
/// The map starts zeroed; `configured` stays 0 until userspace writes the
/// first snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSettings {
    pub configured: u32,
    pub drop_failed: u32,
    pub max_prefixes: u32,
    pub arch: u32,
    /// Byte offset of `thread_info.status` in `task_struct`
    pub thread_status_offset: u32,
    pub _pad: u32,
}

impl KernelSettings {
    pub fn new(profile: &ArchProfile, drop_failed: bool) -> Self {
        Self {
            configured: 1,
            drop_failed: drop_failed as u32,
            max_prefixes: profile.max_prefixes as u32,
            arch: match profile.arch {
                Arch::X86_64 => ARCH_X86_64,
                Arch::Aarch64 => ARCH_AARCH64,
            },
            thread_status_offset: 0,
            _pad: 0,
        }
    }

    pub fn with_thread_status_offset(mut self, offset: u32) -> Self {
        self.thread_status_offset = offset;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.configured != 0
    }

    pub fn profile(&self) -> ArchProfile {
        let arch = if self.arch == ARCH_AARCH64 {
            Arch::Aarch64
        } else {
            Arch::X86_64
        };
        ArchProfile::for_arch(arch).with_max_prefixes(self.max_prefixes as usize)
    }
}

/// Admitted syscall exit, handed from the exit program to the emit program
/// through `EXIT_SCRATCH` and then to userspace
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRecord {
    pub timestamp: u64,
    pub args: [u64; 6],
    pub return_value: i64,
    pub pid: u32,
    pub tid: u32,
    pub raw_id: u32,
    pub syscall_id: u32,
    pub compat: u32,
    pub _pad: u32,
    pub comm: [u8; TASK_COMM_LEN],
}

impl ExitRecord {
    pub const fn zeroed() -> Self {
        Self {
            timestamp: 0,
            args: [0; 6],
            return_value: 0,
            pid: 0,
            tid: 0,
            raw_id: 0,
            syscall_id: 0,
            compat: 0,
            _pad: 0,
            comm: [0; TASK_COMM_LEN],
        }
    }

    /// Convert into a userspace event received on channel `devid`.
    #[cfg(feature = "std")]
    pub fn into_event(self, devid: crate::types::events::DevId) -> crate::types::events::SyscallEvent {
        use crate::types::events::{RegisterSnapshot, SyscallEvent};

        let comm_len = self
            .comm
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TASK_COMM_LEN);
        let comm = String::from_utf8_lossy(&self.comm[..comm_len]).into_owned();

        SyscallEvent {
            timestamp: self.timestamp,
            pid: self.pid as i32,
            tid: self.tid as i32,
            regs: RegisterSnapshot {
                syscall_id: self.raw_id,
                args: self.args,
                compat: self.compat != 0,
            },
            syscall_id: Some(self.syscall_id),
            return_value: self.return_value,
            devid,
            comm: Some(comm),
        }
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for KernelSettings {}

#[cfg(feature = "user")]
unsafe impl aya::Pod for ExitRecord {}
